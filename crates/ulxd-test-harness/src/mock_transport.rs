//! Mock transport for deterministic testing of the protocol layer.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! command/reply pairs and a queue of unsolicited inbound data. This lets
//! you test frame building, reply parsing, and report classification
//! without a receiver on the network.
//!
//! # Example
//!
//! ```
//! use ulxd_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! // When the client sends this command, answer with this reply.
//! mock.expect(b"< GET 1 BATT_CHARGE >", b"< REP 1 BATT_CHARGE 087 >");
//! // Data the receiver pushes on its own.
//! mock.push_inbound(b"< REP 1 RF_INT_DET NONE >");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ulxd_core::error::{IoError, Result};
use ulxd_core::transport::Transport;

/// A pre-loaded command/reply pair.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// Reply chunks, each returned by a separate `receive()` call.
    chunks: Vec<Vec<u8>>,
}

/// One item waiting to be returned by `receive()`.
#[derive(Debug)]
enum Inbound {
    Data(Vec<u8>),
    Error(std::io::Error),
}

/// A mock [`Transport`] for testing without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation, and the
/// reply chunks are queued behind any inbound data already pending.
///
/// `receive()` returns queued data first. With nothing queued it waits for
/// the requested timeout and fails with [`IoError::ReadTimeout`], or, once
/// [`close_when_drained`](MockTransport::close_when_drained) was called,
/// reports end of stream with [`IoError::ConnectionClosed`].
#[derive(Debug)]
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    inbound: VecDeque<Inbound>,
    connected: bool,
    closed: Arc<AtomicBool>,
    eof_when_drained: bool,
    write_limit: Option<usize>,
    read_delay: Option<Duration>,
    sent_log: Vec<Vec<u8>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            inbound: VecDeque::new(),
            connected: true,
            closed: Arc::new(AtomicBool::new(false)),
            eof_when_drained: false,
            write_limit: None,
            read_delay: None,
            sent_log: Vec::new(),
        }
    }

    /// Add an expected command/reply pair. An empty reply means the
    /// receiver never answers.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        let chunks = if response.is_empty() {
            Vec::new()
        } else {
            vec![response.to_vec()]
        };
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            chunks,
        });
    }

    /// Like [`expect`](MockTransport::expect), but the reply arrives split
    /// across several reads.
    pub fn expect_chunked(&mut self, request: &[u8], chunks: &[&[u8]]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            chunks: chunks.iter().map(|c| c.to_vec()).collect(),
        });
    }

    /// Queue unsolicited data, returned by one `receive()` call.
    pub fn push_inbound(&mut self, data: &[u8]) {
        self.inbound.push_back(Inbound::Data(data.to_vec()));
    }

    /// Queue a read failure. The transport stays connected afterwards.
    pub fn push_error(&mut self, error: std::io::Error) {
        self.inbound.push_back(Inbound::Error(error));
    }

    /// Report end of stream once all queued data has been read.
    pub fn close_when_drained(&mut self) {
        self.eof_when_drained = true;
    }

    /// Accept at most `limit` bytes per `send()` call.
    pub fn limit_writes(&mut self, limit: usize) {
        self.write_limit = Some(limit);
    }

    /// Hold every read that returns data for `delay` first, so the reader
    /// suspends the way it would on a real socket.
    pub fn delay_reads(&mut self, delay: Duration) {
        self.read_delay = Some(delay);
    }

    /// Flag that turns true once `close()` is called. Stays valid after the
    /// transport is moved into a reader task.
    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }

    /// All data sent through this transport, one element per `send()`.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Number of expectations not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn script_error(msg: String) -> ulxd_core::Error {
    IoError::Os(std::io::Error::new(std::io::ErrorKind::InvalidInput, msg)).into()
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<usize> {
        if !self.connected {
            return Err(IoError::NotConnected.into());
        }

        self.sent_log.push(data.to_vec());

        let Some(expectation) = self.expectations.pop_front() else {
            return Err(script_error(format!(
                "no more expectations in mock transport, got {:?}",
                String::from_utf8_lossy(data)
            )));
        };
        if data != expectation.request.as_slice() {
            return Err(script_error(format!(
                "unexpected send data: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expectation.request),
                String::from_utf8_lossy(data)
            )));
        }

        self.inbound
            .extend(expectation.chunks.into_iter().map(Inbound::Data));

        Ok(match self.write_limit {
            Some(limit) => data.len().min(limit),
            None => data.len(),
        })
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(IoError::NotConnected.into());
        }

        match self.inbound.pop_front() {
            Some(Inbound::Data(data)) => {
                if let Some(delay) = self.read_delay {
                    tokio::time::sleep(delay.min(timeout)).await;
                }
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.inbound.push_front(Inbound::Data(data[n..].to_vec()));
                }
                Ok(n)
            }
            Some(Inbound::Error(e)) => Err(IoError::Os(e).into()),
            None if self.eof_when_drained => Err(IoError::ConnectionClosed.into()),
            None => {
                tokio::time::sleep(timeout).await;
                Err(IoError::ReadTimeout.into())
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.connected = false;
        self.closed.store(true, Ordering::SeqCst);
        self.inbound.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn peer(&self) -> &str {
        "mock"
    }
}
