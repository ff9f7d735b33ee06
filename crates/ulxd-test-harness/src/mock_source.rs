//! Scripted connection source.
//!
//! [`MockSource`] hands out pre-built transports in order and records how
//! each borrowed connection came back. Released connections are reused by
//! the next `acquire`, so one [`MockTransport`] with several expectations
//! can serve a sequence of calls.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use ulxd_core::error::{IoError, Result};
use ulxd_core::source::ConnectionSource;
use ulxd_core::transport::Transport;

use crate::MockTransport;

#[derive(Default)]
struct Inner {
    ready: Mutex<VecDeque<Box<dyn Transport>>>,
    acquired: AtomicUsize,
    released: AtomicUsize,
    discarded: AtomicUsize,
}

/// A [`ConnectionSource`] backed by scripted transports.
///
/// When no transport is left, `acquire` waits until the deadline and fails
/// with [`IoError::ConnectTimeout`]. Clones share state.
#[derive(Clone, Default)]
pub struct MockSource {
    inner: Arc<Inner>,
}

impl MockSource {
    /// Create a source that hands out `transports` in order.
    pub fn new(transports: Vec<MockTransport>) -> Self {
        let ready = transports
            .into_iter()
            .map(|t| Box::new(t) as Box<dyn Transport>)
            .collect();
        MockSource {
            inner: Arc::new(Inner {
                ready: Mutex::new(ready),
                ..Inner::default()
            }),
        }
    }

    /// Number of successful `acquire` calls.
    pub fn acquired(&self) -> usize {
        self.inner.acquired.load(Ordering::SeqCst)
    }

    /// Number of connections handed back as reusable.
    pub fn released(&self) -> usize {
        self.inner.released.load(Ordering::SeqCst)
    }

    /// Number of connections handed back as unusable.
    pub fn discarded(&self) -> usize {
        self.inner.discarded.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionSource for MockSource {
    async fn acquire(&self, deadline: Instant) -> Result<Box<dyn Transport>> {
        let next = self.inner.ready.lock().await.pop_front();
        match next {
            Some(conn) => {
                self.inner.acquired.fetch_add(1, Ordering::SeqCst);
                Ok(conn)
            }
            None => {
                tokio::time::sleep_until(deadline).await;
                Err(IoError::ConnectTimeout.into())
            }
        }
    }

    async fn release(&self, conn: Box<dyn Transport>) {
        self.inner.released.fetch_add(1, Ordering::SeqCst);
        self.inner.ready.lock().await.push_front(conn);
    }

    async fn discard(&self, mut conn: Box<dyn Transport>) {
        self.inner.discarded.fetch_add(1, Ordering::SeqCst);
        let _ = conn.close().await;
    }
}
