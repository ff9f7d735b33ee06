//! Loopback receiver for socket-level testing.
//!
//! [`MockTcpServer`] listens on a random localhost port, accepts one
//! connection, answers scripted commands in order, pushes any queued report
//! frames, and then closes the connection. That is enough to drive the TCP
//! transport, the pooled connection source, and the report stream reader
//! end to end without hardware.
//!
//! # Example
//!
//! ```
//! use ulxd_test_harness::MockTcpServer;
//!
//! # async fn example() -> std::io::Result<()> {
//! let mut server = MockTcpServer::new().await?;
//! server.expect(b"< GET 1 BATT_CHARGE >", b"< REP 1 BATT_CHARGE 087 >");
//! server.push_report(b"< REP 1 RF_INT_DET NONE >");
//! let addr = server.addr().to_string();
//! server.start();
//! // ... connect to `addr` and test ...
//! server.wait().await.expect("script completed");
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Clone)]
struct TcpExpectation {
    request: Vec<u8>,
    response: Vec<u8>,
}

/// A scripted single-connection receiver.
///
/// Script steps run in this order once a client connects: every
/// expectation (read exactly the request bytes, compare, write the reply),
/// then every pushed report, then an optional hold, then close.
pub struct MockTcpServer {
    addr: String,
    listener: Option<TcpListener>,
    expectations: VecDeque<TcpExpectation>,
    reports: Vec<Vec<u8>>,
    hold_open: Duration,
    server_handle: Option<JoinHandle<Result<(), String>>>,
}

impl MockTcpServer {
    /// Bind a listener on `127.0.0.1` with an OS-assigned port.
    ///
    /// Connections are not accepted until [`start`](MockTcpServer::start),
    /// but the listener is bound already, so clients may connect early.
    pub async fn new() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?.to_string();
        Ok(Self {
            addr,
            listener: Some(listener),
            expectations: VecDeque::new(),
            reports: Vec::new(),
            hold_open: Duration::ZERO,
            server_handle: None,
        })
    }

    /// Add an expected command and the reply to send back.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(TcpExpectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Queue an unsolicited report frame, written after all expectations.
    pub fn push_report(&mut self, frame: &[u8]) {
        self.reports.push(frame.to_vec());
    }

    /// Keep the connection open for `duration` after the script finishes.
    pub fn hold_open(&mut self, duration: Duration) {
        self.hold_open = duration;
    }

    /// Address the server listens on, e.g. `127.0.0.1:54321`.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Port the server listens on.
    pub fn port(&self) -> u16 {
        self.addr
            .rsplit(':')
            .next()
            .and_then(|p| p.parse().ok())
            .unwrap_or(0)
    }

    /// Start serving the script in a background task.
    ///
    /// Calling `start` twice has no effect.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let expectations: Vec<TcpExpectation> = self.expectations.drain(..).collect();
        let reports = std::mem::take(&mut self.reports);
        let hold_open = self.hold_open;

        let handle = tokio::spawn(async move {
            let (mut stream, peer) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {e}"))?;
            debug!(peer = %peer, "mock receiver accepted connection");

            serve(&mut stream, &expectations, &reports).await?;

            if !hold_open.is_zero() {
                tokio::time::sleep(hold_open).await;
            }
            Ok(())
        });

        self.server_handle = Some(handle);
    }

    /// Wait for the script to finish and return the first mismatch, if any.
    pub async fn wait(&mut self) -> Result<(), String> {
        match self.server_handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| format!("server task panicked: {e}"))?,
            None => Err("server was not started".into()),
        }
    }
}

async fn serve(
    stream: &mut TcpStream,
    expectations: &[TcpExpectation],
    reports: &[Vec<u8>],
) -> Result<(), String> {
    for (i, expectation) in expectations.iter().enumerate() {
        let mut buf = vec![0u8; expectation.request.len()];
        let mut total_read = 0;

        while total_read < expectation.request.len() {
            let n = stream
                .read(&mut buf[total_read..])
                .await
                .map_err(|e| format!("expectation {i}: read error: {e}"))?;
            if n == 0 {
                return Err(format!(
                    "expectation {i}: client disconnected after {total_read} bytes (expected {})",
                    expectation.request.len()
                ));
            }
            total_read += n;
        }

        if buf != expectation.request {
            return Err(format!(
                "expectation {i}: request mismatch: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expectation.request),
                String::from_utf8_lossy(&buf)
            ));
        }

        stream
            .write_all(&expectation.response)
            .await
            .map_err(|e| format!("expectation {i}: write error: {e}"))?;
    }

    for (i, frame) in reports.iter().enumerate() {
        stream
            .write_all(frame)
            .await
            .map_err(|e| format!("report {i}: write error: {e}"))?;
    }

    stream
        .flush()
        .await
        .map_err(|e| format!("flush error: {e}"))
}
