//! Request/response client.
//!
//! Sends one query frame and waits for exactly one reply frame on a
//! connection borrowed from a [`ConnectionSource`]. Correlation is purely
//! structural: the reply is the next frame read on the same connection, and
//! the source guarantees no other exchange shares that connection while
//! this one is in flight.
//!
//! The client never retries. After each exchange the connection goes back
//! to the source: [`release`](ConnectionSource::release) if the stream is
//! still in sync, [`discard`](ConnectionSource::discard) after any I/O
//! failure or cancellation, a reply that answers a different command, or
//! unexpected trailing bytes.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use ulxd_core::error::{Error, IoError, ParseError, Result};
use ulxd_core::source::ConnectionSource;
use ulxd_core::transport::Transport;

use crate::protocol::{self, Command, FrameSplit, MAX_FRAME_LEN, ParsedFrame};

/// Deadline applied when the caller does not supply one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const RECV_CHUNK: usize = 256;

/// Sends queries through an injected [`ConnectionSource`].
///
/// Cheap to clone; clones share the source. Concurrent calls each borrow
/// their own connection.
#[derive(Clone)]
pub struct Client {
    source: Arc<dyn ConnectionSource>,
}

impl Client {
    /// Create a client over `source`.
    pub fn new(source: Arc<dyn ConnectionSource>) -> Self {
        Client { source }
    }

    /// Query `parameter` on `channel` and return the parsed reply.
    ///
    /// `timeout` bounds acquire, write and read together and defaults to
    /// [`DEFAULT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// - [`IoError::ConnectTimeout`] if no connection is available in time
    /// - [`IoError::WriteShort`] if the frame was only partially written
    /// - [`IoError::ReadTimeout`] if no complete reply arrived in time
    /// - [`IoError::ConnectionClosed`] if the receiver hung up
    /// - [`ParseError::MalformedFrame`] if the reply breaks the grammar
    pub async fn send(
        &self,
        parameter: impl AsRef<str>,
        channel: u32,
        timeout: Option<Duration>,
    ) -> Result<ParsedFrame> {
        let command = Command::get(channel, parameter);
        self.execute(&command, timeout.unwrap_or(DEFAULT_TIMEOUT))
            .await
    }

    /// Like [`send`](Client::send), but abandons the exchange as soon as
    /// `cancel` fires.
    ///
    /// A connection borrowed before cancellation is discarded, never
    /// released, so a reply that arrives late can not be read by the next
    /// caller.
    pub async fn send_cancellable(
        &self,
        parameter: impl AsRef<str>,
        channel: u32,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<ParsedFrame> {
        let command = Command::get(channel, parameter);
        self.run(&command, timeout.unwrap_or(DEFAULT_TIMEOUT), Some(cancel))
            .await
    }

    /// Run one exchange for a prebuilt command.
    ///
    /// A well-formed reply for a different parameter or channel fails with
    /// [`ParseError::ParameterMismatch`] and the connection is discarded.
    pub async fn execute(&self, command: &Command, timeout: Duration) -> Result<ParsedFrame> {
        self.run(command, timeout, None).await
    }

    async fn run(
        &self,
        command: &Command,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<ParsedFrame> {
        let deadline = Instant::now() + timeout;

        debug!(
            channel = command.channel(),
            parameter = command.parameter(),
            timeout_ms = timeout.as_millis(),
            "sending command"
        );

        let acquire = tokio::time::timeout_at(deadline, self.source.acquire(deadline));
        let mut conn = match unless_cancelled(cancel, acquire).await {
            Some(Ok(conn)) => conn?,
            Some(Err(_)) => return Err(IoError::ConnectTimeout.into()),
            None => {
                debug!(channel = command.channel(), "command cancelled before acquire");
                return Err(IoError::Cancelled.into());
            }
        };

        let outcome = match unless_cancelled(cancel, exchange(conn.as_mut(), command, deadline))
            .await
        {
            Some(outcome) => outcome,
            None => {
                debug!(channel = command.channel(), "command cancelled");
                Outcome::failed(IoError::Cancelled)
            }
        };

        if outcome.reusable {
            self.source.release(conn).await;
        } else {
            debug!(peer = conn.peer(), "discarding connection");
            self.source.discard(conn).await;
        }

        outcome.result
    }
}

/// Drive `fut` to completion, or return `None` once `cancel` fires.
async fn unless_cancelled<F: Future>(
    cancel: Option<&CancellationToken>,
    fut: F,
) -> Option<F::Output> {
    match cancel {
        Some(cancel) => tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            out = fut => Some(out),
        },
        None => Some(fut.await),
    }
}

/// Result of one write/read exchange plus whether the connection is still
/// positioned at a frame boundary.
struct Outcome {
    result: Result<ParsedFrame>,
    reusable: bool,
}

impl Outcome {
    fn failed(e: impl Into<Error>) -> Self {
        Outcome {
            result: Err(e.into()),
            reusable: false,
        }
    }
}

async fn exchange(transport: &mut dyn Transport, command: &Command, deadline: Instant) -> Outcome {
    let frame = command.as_bytes();
    trace!(peer = transport.peer(), data = ?String::from_utf8_lossy(frame), "writing command");

    let written = match tokio::time::timeout_at(deadline, transport.send(frame)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => return Outcome::failed(e),
        Err(_) => return Outcome::failed(IoError::WriteTimeout),
    };
    if written < frame.len() {
        warn!(written, expected = frame.len(), "short write");
        return Outcome::failed(IoError::WriteShort {
            written,
            expected: frame.len(),
        });
    }

    let mut response_buf = Vec::with_capacity(64);
    let mut recv_buf = [0u8; RECV_CHUNK];

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Outcome::failed(IoError::ReadTimeout);
        }

        let n = match tokio::time::timeout_at(deadline, transport.receive(&mut recv_buf, remaining))
            .await
        {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Outcome::failed(e),
            Err(_) => return Outcome::failed(IoError::ReadTimeout),
        };
        response_buf.extend_from_slice(&recv_buf[..n]);

        if let FrameSplit::Frame { frame, consumed } = protocol::split_frame(&response_buf) {
            trace!(data = ?String::from_utf8_lossy(frame), "received reply");
            let trailing = response_buf.len() - consumed;
            if trailing > 0 {
                warn!(trailing, "bytes after reply frame, connection out of sync");
            }
            let result = protocol::parse_frame_bytes(frame)
                .and_then(|parsed| {
                    parsed.expect(command.channel(), command.parameter())?;
                    Ok(parsed)
                })
                .map_err(Error::from);
            let in_step = !matches!(&result, Err(e) if e.is_connection_fatal());
            return Outcome {
                result,
                reusable: trailing == 0 && in_step,
            };
        }

        if response_buf.len() > MAX_FRAME_LEN {
            warn!(len = response_buf.len(), "reply exceeds maximum frame length");
            return Outcome::failed(ParseError::MalformedFrame {
                raw: String::from_utf8_lossy(&response_buf).into_owned(),
                reason: "no terminator within maximum frame length",
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulxd_test_harness::{MockSource, MockTransport};

    fn client_with(transports: Vec<MockTransport>) -> (Client, MockSource) {
        let source = MockSource::new(transports);
        (Client::new(Arc::new(source.clone())), source)
    }

    #[tokio::test]
    async fn send_returns_parsed_reply() {
        let mut mock = MockTransport::new();
        mock.expect(b"< GET 1 BATT_CHARGE >", b"< REP 1 BATT_CHARGE 087 >");
        let (client, source) = client_with(vec![mock]);

        let frame = client.send("BATT_CHARGE", 1, None).await.unwrap();
        assert_eq!(frame.channel, Some(1));
        assert_eq!(frame.parameter, "BATT_CHARGE");
        assert_eq!(frame.value, "087");

        assert_eq!(source.released(), 1);
        assert_eq!(source.discarded(), 0);
    }

    #[tokio::test]
    async fn reply_split_across_reads() {
        let mut mock = MockTransport::new();
        mock.expect_chunked(
            b"< GET 2 TX_TYPE >",
            &[b"< REP 2 TX", b"_TYPE ULX", b"D2 >"],
        );
        let (client, _) = client_with(vec![mock]);

        let frame = client.send("TX_TYPE", 2, None).await.unwrap();
        assert_eq!(frame.value, "ULXD2");
    }

    #[tokio::test]
    async fn missing_reply_times_out_and_discards() {
        let mut mock = MockTransport::new();
        mock.expect(b"< GET 1 BATT_TYPE >", b"");
        let (client, source) = client_with(vec![mock]);

        let err = client
            .send("BATT_TYPE", 1, Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(IoError::ReadTimeout)), "{err:?}");
        assert_eq!(source.discarded(), 1);
        assert_eq!(source.released(), 0);
    }

    #[tokio::test]
    async fn partial_reply_then_silence_times_out() {
        let mut mock = MockTransport::new();
        mock.expect(b"< GET 1 BATT_TYPE >", b"< REP 1 BATT_TY");
        let (client, source) = client_with(vec![mock]);

        let err = client
            .send("BATT_TYPE", 1, Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(IoError::ReadTimeout)), "{err:?}");
        assert_eq!(source.discarded(), 1);
    }

    #[tokio::test]
    async fn end_of_stream_is_connection_closed() {
        let mut mock = MockTransport::new();
        mock.expect(b"< GET 1 BATT_TYPE >", b"< REP 1");
        mock.close_when_drained();
        let (client, source) = client_with(vec![mock]);

        let err = client.send("BATT_TYPE", 1, None).await.unwrap_err();
        assert!(
            matches!(err, Error::Io(IoError::ConnectionClosed)),
            "{err:?}"
        );
        assert_eq!(source.discarded(), 1);
    }

    #[tokio::test]
    async fn short_write_is_reported() {
        let mut mock = MockTransport::new();
        mock.expect(b"< GET 1 BATT_TYPE >", b"< REP 1 BATT_TYPE LION >");
        mock.limit_writes(5);
        let (client, source) = client_with(vec![mock]);

        let err = client.send("BATT_TYPE", 1, None).await.unwrap_err();
        match err {
            Error::Io(IoError::WriteShort { written, expected }) => {
                assert_eq!(written, 5);
                assert_eq!(expected, 19);
            }
            other => panic!("expected WriteShort, got {other:?}"),
        }
        assert_eq!(source.discarded(), 1);
    }

    #[tokio::test]
    async fn malformed_reply_keeps_connection() {
        let mut mock = MockTransport::new();
        mock.expect(b"< GET 1 BATT_TYPE >", b"< REP 1 batt_type lion >");
        let (client, source) = client_with(vec![mock]);

        let err = client.send("BATT_TYPE", 1, None).await.unwrap_err();
        assert!(
            matches!(err, Error::Parse(ParseError::MalformedFrame { .. })),
            "{err:?}"
        );
        assert_eq!(source.released(), 1);
        assert_eq!(source.discarded(), 0);
    }

    #[tokio::test]
    async fn trailing_bytes_discard_connection() {
        let mut mock = MockTransport::new();
        mock.expect(
            b"< GET 1 BATT_TYPE >",
            b"< REP 1 BATT_TYPE LION >< REP 1 RF_INT_DET NONE >",
        );
        let (client, source) = client_with(vec![mock]);

        let frame = client.send("BATT_TYPE", 1, None).await.unwrap();
        assert_eq!(frame.value, "LION");
        assert_eq!(source.discarded(), 1);
        assert_eq!(source.released(), 0);
    }

    #[tokio::test]
    async fn acquire_timeout() {
        // No transports: acquire never completes.
        let (client, _) = client_with(vec![]);

        let err = client
            .send("BATT_TYPE", 1, Some(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(IoError::ConnectTimeout)), "{err:?}");
    }

    #[tokio::test]
    async fn reply_for_another_parameter_discards_connection() {
        // The unsolicited report arrives first; the real reply follows it.
        let mut a = MockTransport::new();
        a.expect_chunked(
            b"< GET 1 BATT_CHARGE >",
            &[b"< REP 1 RF_INT_DET NONE >", b"< REP 1 BATT_CHARGE 087 >"],
        );
        let mut b = MockTransport::new();
        b.expect(b"< GET 1 BATT_CHARGE >", b"< REP 1 BATT_CHARGE 050 >");
        let (client, source) = client_with(vec![a, b]);

        let err = client.send("BATT_CHARGE", 1, None).await.unwrap_err();
        assert!(
            matches!(err, Error::Parse(ParseError::ParameterMismatch { .. })),
            "{err:?}"
        );
        assert_eq!(source.released(), 0);
        assert_eq!(source.discarded(), 1);

        // The late 087 reply went away with the discarded connection.
        let frame = client.send("BATT_CHARGE", 1, None).await.unwrap();
        assert_eq!(frame.value, "050");
    }

    #[tokio::test]
    async fn reply_for_another_channel_discards_connection() {
        let mut mock = MockTransport::new();
        mock.expect(b"< GET 1 TX_TYPE >", b"< REP 2 TX_TYPE ULXD2 >");
        let (client, source) = client_with(vec![mock]);

        let err = client.send("TX_TYPE", 1, None).await.unwrap_err();
        assert!(
            matches!(err, Error::Parse(ParseError::ParameterMismatch { .. })),
            "{err:?}"
        );
        assert_eq!(source.discarded(), 1);
    }

    #[tokio::test]
    async fn cancellation_aborts_and_discards_connection() {
        let mut mock = MockTransport::new();
        mock.expect(b"< GET 1 BATT_TYPE >", b"");
        let (client, source) = client_with(vec![mock]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = client
            .send_cancellable("BATT_TYPE", 1, Some(Duration::from_secs(10)), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(IoError::Cancelled)), "{err:?}");
        assert_eq!(source.acquired(), 1);
        assert_eq!(source.released(), 0);
        assert_eq!(source.discarded(), 1);
    }

    #[tokio::test]
    async fn cancellation_while_acquiring() {
        let (client, source) = client_with(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .send_cancellable("BATT_TYPE", 1, Some(Duration::from_secs(10)), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(IoError::Cancelled)), "{err:?}");
        assert_eq!(source.acquired(), 0);
        assert_eq!(source.discarded(), 0);
    }

    #[tokio::test]
    async fn concurrent_calls_use_separate_connections() {
        // Slow replies keep the first connection borrowed while the second
        // call acquires.
        let mut a = MockTransport::new();
        a.expect(b"< GET 1 BATT_BARS >", b"< REP 1 BATT_BARS 3 >");
        a.delay_reads(Duration::from_millis(20));
        let mut b = MockTransport::new();
        b.expect(b"< GET 2 BATT_BARS >", b"< REP 2 BATT_BARS 5 >");
        b.delay_reads(Duration::from_millis(20));
        let (client, source) = client_with(vec![a, b]);

        let (r1, r2) = tokio::join!(
            client.send("BATT_BARS", 1, None),
            client.send("BATT_BARS", 2, None)
        );
        assert_eq!(r1.unwrap().value, "3");
        assert_eq!(r2.unwrap().value, "5");
        assert_eq!(source.acquired(), 2);
        assert_eq!(source.released(), 2);
    }
}
