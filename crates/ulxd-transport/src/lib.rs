//! Transport implementations for ulxd.
//!
//! - [`TcpTransport`]: a plain TCP connection to the receiver's control port
//! - [`TcpConnectionSource`]: a [`ConnectionSource`](ulxd_core::ConnectionSource)
//!   that dials on demand and keeps a couple of released connections idle
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ulxd_transport::TcpConnectionSource;
//!
//! let source = Arc::new(TcpConnectionSource::new("192.168.1.50:2202"));
//! ```

pub mod source;
pub mod tcp;

pub use source::{DEFAULT_IDLE_TTL, DEFAULT_MAX_IDLE, TcpConnectionSource};
pub use tcp::{DEFAULT_CONNECT_TIMEOUT, TcpTransport};
