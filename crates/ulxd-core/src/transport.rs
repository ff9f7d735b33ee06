//! Transport trait for receiver communication.
//!
//! The [`Transport`] trait abstracts over the byte stream to a receiver.
//! The production implementation is a TCP socket (`ulxd-transport`); tests
//! use the scripted `MockTransport` from `ulxd-test-harness`.
//!
//! Framing is not the transport's concern. The request/response client and
//! the report stream reader in `ulxd-text-io` assemble `>`-terminated frames
//! from whatever chunks [`receive`](Transport::receive) hands back.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Asynchronous byte-level transport to a receiver.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write `data` to the receiver and return how many bytes were accepted.
    ///
    /// Implementations keep writing until the whole slice is accepted or
    /// the peer stops accepting bytes; a return value smaller than
    /// `data.len()` is a short write and the caller decides what to do
    /// with it.
    async fn send(&mut self, data: &[u8]) -> Result<usize>;

    /// Receive bytes into `buf`, waiting up to `timeout` for data.
    ///
    /// Returns the number of bytes read (never zero). Fails with
    /// [`IoError::ReadTimeout`](crate::error::IoError::ReadTimeout) when no
    /// data arrives in time and with
    /// [`IoError::ConnectionClosed`](crate::error::IoError::ConnectionClosed)
    /// at end of stream.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Close the connection. Closing twice is a no-op.
    ///
    /// After `close()`, `send()` and `receive()` fail with
    /// [`IoError::NotConnected`](crate::error::IoError::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// Whether the transport is still open.
    fn is_connected(&self) -> bool;

    /// A label for the remote end, used in log fields.
    fn peer(&self) -> &str;
}
