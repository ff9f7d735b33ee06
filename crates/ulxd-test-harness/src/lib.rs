//! ulxd-test-harness: test utilities for the ulxd receiver driver.
//!
//! - [`MockTransport`] scripts command/reply exchanges and unsolicited
//!   inbound data for deterministic unit tests of the protocol layer.
//! - [`MockSource`] hands out scripted transports through the
//!   `ConnectionSource` trait and counts how each one comes back.
//! - [`MockTcpServer`] is a loopback receiver that answers scripted
//!   commands and pushes report frames over a real socket.

pub mod mock_source;
pub mod mock_tcp;
pub mod mock_transport;

pub use mock_source::MockSource;
pub use mock_tcp::MockTcpServer;
pub use mock_transport::MockTransport;
