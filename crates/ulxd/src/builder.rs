//! ReceiverBuilder -- fluent builder for [`Receiver`] handles.
//!
//! # Example
//!
//! ```no_run
//! use ulxd::ReceiverBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> ulxd::Result<()> {
//! let rx = ReceiverBuilder::new("192.168.1.50")
//!     .command_timeout(Duration::from_secs(2))
//!     .build();
//!
//! let charge = rx.battery_charge(1).await?;
//! # Ok(())
//! # }
//! ```

use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::Duration;

use ulxd_core::source::ConnectionSource;
use ulxd_text_io::client::DEFAULT_TIMEOUT;
use ulxd_text_io::protocol::DEFAULT_PORT;
use ulxd_text_io::stream::DEFAULT_REPORT_CAPACITY;
use ulxd_transport::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_IDLE_TTL, DEFAULT_MAX_IDLE, TcpConnectionSource,
};

use crate::receiver::Receiver;

/// Fluent builder for [`Receiver`].
///
/// Nothing is dialed at build time; connections open on the first query.
pub struct ReceiverBuilder {
    host: Option<String>,
    port: u16,
    command_timeout: Duration,
    connect_timeout: Duration,
    report_capacity: usize,
    idle_ttl: Duration,
    max_idle: usize,
    source: Option<Arc<dyn ConnectionSource>>,
}

impl ReceiverBuilder {
    /// Create a builder for the receiver at `host` (name or IP address).
    pub fn new(host: impl Into<String>) -> Self {
        ReceiverBuilder {
            host: Some(host.into()),
            port: DEFAULT_PORT,
            command_timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            report_capacity: DEFAULT_REPORT_CAPACITY,
            idle_ttl: DEFAULT_IDLE_TTL,
            max_idle: DEFAULT_MAX_IDLE,
            source: None,
        }
    }

    /// Create a builder that sends every query through `source` and has no
    /// address of its own, so [`Receiver::start_reporting`] is unavailable.
    pub fn from_source(source: Arc<dyn ConnectionSource>) -> Self {
        ReceiverBuilder {
            host: None,
            source: Some(source),
            ..ReceiverBuilder::new("")
        }
    }

    /// Control port (default: 2202).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Deadline for one query, covering acquire, write, and read
    /// (default: 5s).
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Dial timeout for the report connection (default: 30s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Reports buffered before the reader waits for the consumer
    /// (default: 256).
    pub fn report_capacity(mut self, capacity: usize) -> Self {
        self.report_capacity = capacity;
        self
    }

    /// How long a released query connection stays reusable (default: 30s).
    pub fn idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    /// Maximum idle query connections kept open (default: 2).
    pub fn max_idle(mut self, max: usize) -> Self {
        self.max_idle = max;
        self
    }

    /// Send queries through `source` instead of dialing TCP directly.
    ///
    /// The idle settings are ignored when a source is supplied.
    pub fn connection_source(mut self, source: Arc<dyn ConnectionSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Build the [`Receiver`].
    pub fn build(self) -> Receiver {
        let addr = self.host.as_deref().map(|h| join_host_port(h, self.port));

        // `from_source` is the only way to have no host, and it sets a source.
        let source: Arc<dyn ConnectionSource> = match self.source {
            Some(source) => source,
            None => Arc::new(
                TcpConnectionSource::new(addr.clone().unwrap_or_default())
                    .with_idle_ttl(self.idle_ttl)
                    .with_max_idle(self.max_idle),
            ),
        };

        Receiver::new(
            source,
            addr,
            self.command_timeout,
            self.connect_timeout,
            self.report_capacity,
        )
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
