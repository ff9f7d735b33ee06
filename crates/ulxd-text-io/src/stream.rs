//! Report stream reader.
//!
//! A [`ReportStream`] owns one long-lived connection and a background task
//! that reads bytes up to each `>` terminator, classifies every frame into
//! a [`Report`], and publishes the reports in wire order onto a bounded
//! queue.
//!
//! # Queue policy
//!
//! The queue holds [`DEFAULT_REPORT_CAPACITY`] reports unless configured
//! otherwise. When it is full the reader stops reading until the consumer
//! catches up (back-pressure); nothing is dropped. Dropping the
//! [`ReportStream`] stops the task and closes the connection.
//!
//! # Termination
//!
//! End of stream produces exactly one `Error/ConnectionClosedError` report,
//! after which the queue yields `None`. [`ReportStream::cancel`] closes the
//! connection, which drives the reader through the same path.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use ulxd_core::error::{Error, IoError};
use ulxd_core::report::{PARSE_ERROR, READ_ERROR, Report};
use ulxd_core::transport::Transport;

use crate::classify;
use crate::protocol::{self, FrameSplit, MAX_FRAME_LEN};

/// Default number of reports buffered between the reader and the consumer.
pub const DEFAULT_REPORT_CAPACITY: usize = 256;

/// How long a single read waits before the loop checks for cancellation.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pause after a non-fatal read error before reading again.
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Lifecycle of the reader task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// The connection is established; the task has not started reading.
    Connected,
    /// The task is reading frames.
    Reading,
    /// The connection is closed and the queue will yield no new reports.
    Closed,
}

/// Handle to a running report reader.
pub struct ReportStream {
    reports: mpsc::Receiver<Report>,
    state: watch::Receiver<StreamState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
    _cancel_on_drop: DropGuard,
}

impl ReportStream {
    /// Start reading reports from an already connected transport.
    ///
    /// `capacity` is clamped to at least one.
    pub fn spawn(transport: Box<dyn Transport>, capacity: usize) -> Self {
        let (tx, reports) = mpsc::channel(capacity.max(1));
        let (state_tx, state) = watch::channel(StreamState::Connected);
        let cancel = CancellationToken::new();

        info!(peer = transport.peer(), capacity, "starting report stream");
        let task = tokio::spawn(read_loop(transport, tx, state_tx, cancel.clone()));

        ReportStream {
            reports,
            state,
            _cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            task,
        }
    }

    /// Next report in wire order, or `None` once the stream has closed and
    /// every buffered report has been consumed.
    pub async fn recv(&mut self) -> Option<Report> {
        self.reports.recv().await
    }

    /// Current state of the reader task.
    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Wait until the reader reaches [`StreamState::Closed`].
    ///
    /// The reader only gets there once its queue has room for the final
    /// report, so a consumer that stops draining may wait forever.
    pub async fn wait_closed(&mut self) {
        let _ = self
            .state
            .wait_for(|s| *s == StreamState::Closed)
            .await;
    }

    /// Ask the reader to close its connection.
    ///
    /// The connection closes promptly even while the reader waits on a full
    /// queue. The final `ConnectionClosedError` report still arrives.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this stream when triggered, for wiring into a
    /// caller's own shutdown tree.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel, drain every remaining report, and wait for the task to exit.
    pub async fn shutdown(mut self) -> Vec<Report> {
        self.cancel.cancel();
        let mut remaining = Vec::new();
        while let Some(report) = self.reports.recv().await {
            remaining.push(report);
        }
        let _ = (&mut self.task).await;
        remaining
    }
}

// ---------------------------------------------------------------------------
// Reader task
// ---------------------------------------------------------------------------

async fn read_loop(
    mut transport: Box<dyn Transport>,
    tx: mpsc::Sender<Report>,
    state: watch::Sender<StreamState>,
    cancel: CancellationToken,
) {
    let _ = state.send(StreamState::Reading);
    let mut buf: Vec<u8> = Vec::with_capacity(256);
    let mut recv_buf = [0u8; 256];

    'reading: loop {
        let received = tokio::select! {
            biased;

            _ = cancel.cancelled(), if transport.is_connected() => {
                debug!("report stream cancelled, closing connection");
                close_connection(transport.as_mut()).await;
                continue;
            }

            r = transport.receive(&mut recv_buf, POLL_INTERVAL) => r,
        };

        match received {
            Ok(n) => {
                buf.extend_from_slice(&recv_buf[..n]);

                while let FrameSplit::Frame { frame, consumed } = protocol::split_frame(&buf) {
                    let report = classify::classify_bytes(frame);
                    buf.drain(..consumed);
                    if !publish(&tx, report, transport.as_mut(), &cancel).await {
                        break 'reading;
                    }
                }

                if buf.len() > MAX_FRAME_LEN {
                    warn!(len = buf.len(), "report buffer overflow, resetting");
                    let report = Report::error(
                        PARSE_ERROR,
                        "Report exceeds maximum frame length",
                        String::from_utf8_lossy(&buf),
                    );
                    buf.clear();
                    if !publish(&tx, report, transport.as_mut(), &cancel).await {
                        break;
                    }
                }
            }
            Err(Error::Io(IoError::ReadTimeout)) => {}
            Err(Error::Io(IoError::ConnectionClosed | IoError::NotConnected)) => {
                flush_truncated(&tx, &buf).await;
                info!("report connection closed");
                let _ = tx.send(Report::connection_closed()).await;
                break;
            }
            Err(e) => {
                warn!(error = %e, "error reading report stream");
                let report = Report::error(
                    READ_ERROR,
                    format!("Error while reading from receiver: {e}"),
                    String::new(),
                );
                if !publish(&tx, report, transport.as_mut(), &cancel).await {
                    break;
                }
                tokio::time::sleep(READ_ERROR_BACKOFF).await;
            }
        }
    }

    drop(tx);
    let _ = state.send(StreamState::Closed);
    if transport.is_connected() {
        let _ = transport.close().await;
    }
    debug!("report stream task exited");
}

/// Push one report; `false` once the consumer has gone away.
///
/// Cancellation while the queue is full closes the connection right away.
/// The report still waits for room, so nothing already read is lost.
async fn publish(
    tx: &mpsc::Sender<Report>,
    report: Report,
    transport: &mut dyn Transport,
    cancel: &CancellationToken,
) -> bool {
    let permit = tokio::select! {
        biased;

        permit = tx.reserve() => permit,

        _ = cancel.cancelled(), if transport.is_connected() => {
            debug!("report stream cancelled with a full queue, closing connection");
            close_connection(transport).await;
            tx.reserve().await
        }
    };

    match permit {
        Ok(permit) => {
            permit.send(report);
            true
        }
        Err(_) => {
            debug!("report consumer dropped, stopping reader");
            false
        }
    }
}

async fn close_connection(transport: &mut dyn Transport) {
    if let Err(e) = transport.close().await {
        warn!(error = %e, "error closing report connection");
    }
}

/// A partial frame left when the stream ends is reported rather than lost.
async fn flush_truncated(tx: &mpsc::Sender<Report>, buf: &[u8]) {
    if buf.iter().all(u8::is_ascii_whitespace) {
        return;
    }
    let raw = String::from_utf8_lossy(buf).into_owned();
    warn!(raw = %raw, "connection closed mid-frame");
    let _ = tx
        .send(Report::error(
            PARSE_ERROR,
            "Connection closed before report was terminated",
            raw,
        ))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use ulxd_core::report::{CONNECTION_CLOSED, ReportKind, UNRECOGNIZED_REPORT};
    use ulxd_test_harness::MockTransport;

    async fn collect(stream: &mut ReportStream) -> Vec<Report> {
        let mut out = Vec::new();
        while let Some(r) = stream.recv().await {
            out.push(r);
        }
        out
    }

    #[tokio::test]
    async fn frames_in_order_then_connection_closed() {
        let mut mock = MockTransport::new();
        mock.push_inbound(b"< REP 1 BATT_CYCLE 00012 >");
        mock.push_inbound(b"< REP 2 RF_INT_DET CRITICAL >");
        mock.push_inbound(b"< REP 1 TX_TYPE UNKN >");
        mock.close_when_drained();

        let mut stream = ReportStream::spawn(Box::new(mock), 16);
        let reports = collect(&mut stream).await;

        assert_eq!(reports.len(), 4);
        assert_eq!(reports[0].kind, ReportKind::BatteryCycles);
        assert_eq!(reports[0].value, "12");
        assert_eq!(reports[1].kind, ReportKind::Interference);
        assert_eq!(reports[1].channel, Some(2));
        assert_eq!(reports[2].kind, ReportKind::Power);
        assert_eq!(reports[2].value, "STANDBY");
        assert!(reports[3].is_connection_closed());

        stream.wait_closed().await;
        assert_eq!(stream.state(), StreamState::Closed);
    }

    #[tokio::test]
    async fn several_frames_in_one_read_and_one_frame_across_reads() {
        let mut mock = MockTransport::new();
        mock.push_inbound(b"< REP 1 BATT_TYPE LION >< REP 1 BATT_RUN");
        mock.push_inbound(b"_TIME 65534 >\r\n< REP 1 BATT_BARS 3 >");
        mock.close_when_drained();

        let mut stream = ReportStream::spawn(Box::new(mock), 16);
        let reports = collect(&mut stream).await;

        let values: Vec<_> = reports.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(
            values,
            vec!["LION", "CALCULATING", "3", CONNECTION_CLOSED]
        );
    }

    #[tokio::test]
    async fn malformed_and_unknown_frames_do_not_stop_the_stream() {
        let mut mock = MockTransport::new();
        mock.push_inbound(b"< REP 1 batt_cycle 3 >");
        mock.push_inbound(b"< REP 1 AUDIO_GAIN 030 >");
        mock.push_inbound(b"< REP 1 BATT_CYCLE 65535 >");
        mock.close_when_drained();

        let mut stream = ReportStream::spawn(Box::new(mock), 16);
        let reports = collect(&mut stream).await;

        assert_eq!(reports.len(), 4);
        assert_eq!(reports[0].value, PARSE_ERROR);
        assert_eq!(reports[1].value, UNRECOGNIZED_REPORT);
        assert_eq!(reports[2].value, "UNKNOWN");
        assert!(reports[3].is_connection_closed());
    }

    #[tokio::test]
    async fn read_error_is_reported_and_reading_continues() {
        let mut mock = MockTransport::new();
        mock.push_inbound(b"< REP 1 BATT_CYCLE 1 >");
        mock.push_error(std::io::Error::new(
            std::io::ErrorKind::Other,
            "checksum hiccup",
        ));
        mock.push_inbound(b"< REP 1 BATT_CYCLE 2 >");
        mock.close_when_drained();

        let mut stream = ReportStream::spawn(Box::new(mock), 16);
        let reports = collect(&mut stream).await;

        assert_eq!(reports.len(), 4);
        assert_eq!(reports[0].value, "1");
        assert_eq!(reports[1].kind, ReportKind::Error);
        assert_eq!(reports[1].value, READ_ERROR);
        assert!(reports[1].message.contains("checksum hiccup"));
        assert_eq!(reports[2].value, "2");
        assert!(reports[3].is_connection_closed());
    }

    #[tokio::test]
    async fn truncated_frame_at_close_becomes_parse_error() {
        let mut mock = MockTransport::new();
        mock.push_inbound(b"< REP 1 BATT_CY");
        mock.close_when_drained();

        let mut stream = ReportStream::spawn(Box::new(mock), 16);
        let reports = collect(&mut stream).await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].value, PARSE_ERROR);
        assert_eq!(reports[0].full_report, "< REP 1 BATT_CY");
        assert!(reports[1].is_connection_closed());
    }

    #[tokio::test]
    async fn oversized_garbage_is_reset() {
        let mut mock = MockTransport::new();
        mock.push_inbound(&vec![b'x'; MAX_FRAME_LEN + 1]);
        mock.push_inbound(b"< REP 1 BATT_CYCLE 7 >");
        mock.close_when_drained();

        let mut stream = ReportStream::spawn(Box::new(mock), 16);
        let reports = collect(&mut stream).await;

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].value, PARSE_ERROR);
        assert_eq!(reports[1].value, "7");
        assert!(reports[2].is_connection_closed());
    }

    #[tokio::test]
    async fn cancel_closes_connection_and_ends_stream() {
        let mock = MockTransport::new();
        let mut stream = ReportStream::spawn(Box::new(mock), 16);

        stream.cancel();
        let reports = collect(&mut stream).await;

        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_connection_closed());
        stream.wait_closed().await;
        assert_eq!(stream.state(), StreamState::Closed);
    }

    #[tokio::test]
    async fn shutdown_drains_remaining_reports() {
        let mut mock = MockTransport::new();
        mock.push_inbound(b"< REP 1 BATT_CYCLE 1 >");
        let stream = ReportStream::spawn(Box::new(mock), 16);

        // Give the reader a moment to pick up the first frame.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let remaining = stream.shutdown().await;

        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].value, "1");
        assert!(remaining[1].is_connection_closed());
    }

    #[tokio::test]
    async fn full_queue_applies_back_pressure_without_loss() {
        let mut mock = MockTransport::new();
        for i in 0..10 {
            mock.push_inbound(format!("< REP 1 BATT_CYCLE {i} >").as_bytes());
        }
        mock.close_when_drained();

        let mut stream = ReportStream::spawn(Box::new(mock), 2);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(stream.state(), StreamState::Reading);

        let reports = collect(&mut stream).await;
        assert_eq!(reports.len(), 11);
        for (i, r) in reports.iter().take(10).enumerate() {
            assert_eq!(r.value, i.to_string());
        }
    }

    #[tokio::test]
    async fn cancel_with_full_queue_closes_connection_at_once() {
        let mut mock = MockTransport::new();
        for i in 0..3 {
            mock.push_inbound(format!("< REP 1 BATT_CYCLE {i} >").as_bytes());
        }
        let closed = mock.closed_flag();

        let mut stream = ReportStream::spawn(Box::new(mock), 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!closed.load(Ordering::SeqCst));

        // Nothing consumed yet: the reader is parked on the full queue.
        stream.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(closed.load(Ordering::SeqCst));

        let reports = collect(&mut stream).await;
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].value, "0");
        assert_eq!(reports[1].value, "1");
        assert!(reports[2].is_connection_closed());
    }
}
