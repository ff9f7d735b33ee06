//! Connection source abstraction used by the request/response client.
//!
//! The client owns no persistent connection. For every command it borrows
//! one [`Transport`] from a [`ConnectionSource`], performs exactly one
//! write and one read on it, and hands it back: [`release`] when the
//! exchange left the stream in sync, [`discard`] otherwise. Pooling, reuse
//! and retry policy live entirely behind this trait.
//!
//! [`release`]: ConnectionSource::release
//! [`discard`]: ConnectionSource::discard

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::Result;
use crate::transport::Transport;

/// Hands out exclusive connections to one receiver.
///
/// A connection returned from [`acquire`](ConnectionSource::acquire) is
/// used by exactly one in-flight exchange until it is released or
/// discarded, which is what makes structural reply correlation (next frame
/// on the same connection) sound.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    /// Borrow a connection, honoring `deadline`.
    ///
    /// Implementations should fail with
    /// [`IoError::ConnectTimeout`](crate::error::IoError::ConnectTimeout)
    /// rather than wait past the deadline; callers additionally bound the
    /// call with `tokio::time::timeout_at`.
    async fn acquire(&self, deadline: Instant) -> Result<Box<dyn Transport>>;

    /// Return a connection that is still usable.
    async fn release(&self, conn: Box<dyn Transport>);

    /// Return a connection that must not be reused.
    async fn discard(&self, conn: Box<dyn Transport>);
}
