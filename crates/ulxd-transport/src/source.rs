//! Dial-on-demand connection source over TCP.
//!
//! [`TcpConnectionSource`] gives each request exclusive use of one TCP
//! connection. Connections handed back with `release` are kept idle for a
//! short time and reused; anything older than the idle TTL is closed instead
//! of reused, since the receiver drops quiet control connections on its own.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use ulxd_core::error::{IoError, Result};
use ulxd_core::source::ConnectionSource;
use ulxd_core::transport::Transport;

use crate::tcp::TcpTransport;

/// How long a released connection may sit idle before it is closed.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30);

/// Maximum number of idle connections kept per source.
pub const DEFAULT_MAX_IDLE: usize = 2;

struct Idle {
    conn: Box<dyn Transport>,
    since: Instant,
}

/// A [`ConnectionSource`] that dials `addr` when no idle connection is
/// available.
pub struct TcpConnectionSource {
    addr: String,
    idle_ttl: Duration,
    max_idle: usize,
    idle: Mutex<Vec<Idle>>,
}

impl TcpConnectionSource {
    /// Create a source for a `host:port` address with default idle limits.
    pub fn new(addr: impl Into<String>) -> Self {
        TcpConnectionSource {
            addr: addr.into(),
            idle_ttl: DEFAULT_IDLE_TTL,
            max_idle: DEFAULT_MAX_IDLE,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Close idle connections older than `ttl`.
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    /// Keep at most `max` idle connections. Zero disables reuse.
    pub fn with_max_idle(mut self, max: usize) -> Self {
        self.max_idle = max;
        self
    }

    /// The address this source dials.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Number of connections currently idle.
    pub async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }

    /// Take the most recently released connection that is still fresh.
    async fn take_idle(&self) -> Option<Box<dyn Transport>> {
        let mut idle = self.idle.lock().await;
        while let Some(entry) = idle.pop() {
            if entry.since.elapsed() < self.idle_ttl && entry.conn.is_connected() {
                return Some(entry.conn);
            }
            tracing::debug!(addr = %self.addr, "Dropping stale idle connection");
        }
        None
    }
}

#[async_trait]
impl ConnectionSource for TcpConnectionSource {
    async fn acquire(&self, deadline: Instant) -> Result<Box<dyn Transport>> {
        if let Some(conn) = self.take_idle().await {
            tracing::trace!(addr = %self.addr, "Reusing idle connection");
            return Ok(conn);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(IoError::ConnectTimeout.into());
        }
        let conn = TcpTransport::connect_with_timeout(&self.addr, remaining).await?;
        Ok(Box::new(conn))
    }

    async fn release(&self, mut conn: Box<dyn Transport>) {
        if !conn.is_connected() {
            return;
        }
        let mut idle = self.idle.lock().await;
        if idle.len() >= self.max_idle {
            drop(idle);
            let _ = conn.close().await;
            return;
        }
        idle.push(Idle {
            conn,
            since: Instant::now(),
        });
    }

    async fn discard(&self, mut conn: Box<dyn Transport>) {
        tracing::debug!(addr = %self.addr, peer = conn.peer(), "Discarding connection");
        let _ = conn.close().await;
    }
}
