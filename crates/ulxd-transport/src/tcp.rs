//! TCP transport for receiver communication.
//!
//! This module provides [`TcpTransport`], which implements the [`Transport`]
//! trait over a plain TCP connection to the receiver's control port
//! (2202 by default).
//!
//! # Example
//!
//! ```no_run
//! use ulxd_transport::TcpTransport;
//! use ulxd_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> ulxd_core::Result<()> {
//! let mut transport = TcpTransport::connect("192.168.1.50:2202").await?;
//!
//! transport.send(b"< GET 1 BATT_CHARGE >").await?;
//!
//! let mut buf = [0u8; 256];
//! let n = transport.receive(&mut buf, Duration::from_secs(2)).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use ulxd_core::error::{Error, IoError, Result};
use ulxd_core::transport::Transport;

/// Default connection timeout (30 seconds).
///
/// Matches the time a receiver on a busy network can take to accept a
/// second control connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// TCP transport for receiver communication.
///
/// The connection is established eagerly via [`connect`](TcpTransport::connect)
/// or [`connect_with_timeout`](TcpTransport::connect_with_timeout).
#[derive(Debug)]
pub struct TcpTransport {
    /// The underlying TCP stream, `None` after `close()` is called.
    stream: Option<TcpStream>,
    /// The address string for logging/debugging.
    addr: String,
}

impl TcpTransport {
    /// Connect to a `host:port` endpoint using [`DEFAULT_CONNECT_TIMEOUT`].
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with_timeout(addr, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to a `host:port` endpoint with a specified timeout.
    ///
    /// # Errors
    ///
    /// - [`IoError::ConnectTimeout`] if the connection is not established in time
    /// - [`IoError::ConnectRefused`] if nothing listens on the port
    /// - [`IoError::Os`] for any other failure (DNS, unreachable network, ...)
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self> {
        tracing::debug!(
            addr = %addr,
            timeout_ms = timeout.as_millis(),
            "Connecting to receiver"
        );

        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                tracing::error!(addr = %addr, "TCP connection timed out");
                Error::from(IoError::ConnectTimeout)
            })?
            .map_err(|e| {
                tracing::error!(addr = %addr, error = %e, "TCP connection failed");
                map_connect_error(e, addr)
            })?;

        // Commands are a few dozen bytes and latency-sensitive.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(
                addr = %addr,
                error = %e,
                "Failed to set TCP_NODELAY (continuing anyway)"
            );
        }

        tracing::info!(addr = %addr, "TCP connection established");

        Ok(Self {
            stream: Some(stream),
            addr: addr.to_string(),
        })
    }

    /// Wrap an already connected `TcpStream`.
    pub fn from_stream(stream: TcpStream, addr: String) -> Self {
        tracing::debug!(addr = %addr, "Wrapping existing TCP stream");
        Self {
            stream: Some(stream),
            addr,
        }
    }

    /// Get the address string this transport was connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8]) -> Result<usize> {
        let stream = self
            .stream
            .as_mut()
            .ok_or(Error::Io(IoError::NotConnected))?;

        tracing::trace!(
            addr = %self.addr,
            bytes = data.len(),
            data = ?String::from_utf8_lossy(data),
            "Sending data"
        );

        let mut written = 0;
        while written < data.len() {
            let n = stream.write(&data[written..]).await.map_err(|e| {
                tracing::error!(
                    addr = %self.addr,
                    error = %e,
                    "Failed to send data"
                );
                map_io_error(e)
            })?;
            if n == 0 {
                tracing::warn!(
                    addr = %self.addr,
                    written,
                    expected = data.len(),
                    "Socket accepted no more bytes"
                );
                break;
            }
            written += n;
        }

        stream.flush().await.map_err(|e| {
            tracing::error!(
                addr = %self.addr,
                error = %e,
                "Failed to flush TCP stream"
            );
            map_io_error(e)
        })?;

        Ok(written)
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self
            .stream
            .as_mut()
            .ok_or(Error::Io(IoError::NotConnected))?;

        let result = tokio::time::timeout(timeout, stream.read(buf)).await;

        match result {
            Ok(Ok(0)) => {
                tracing::info!(addr = %self.addr, "Peer closed connection (0 bytes read)");
                Err(IoError::ConnectionClosed.into())
            }
            Ok(Ok(n)) => {
                tracing::trace!(
                    addr = %self.addr,
                    bytes = n,
                    data = ?String::from_utf8_lossy(&buf[..n]),
                    "Received data"
                );
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(
                    addr = %self.addr,
                    error = %e,
                    "Failed to receive data"
                );
                Err(map_io_error(e))
            }
            Err(_) => Err(IoError::ReadTimeout.into()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!(addr = %self.addr, "Closing TCP connection");

            if let Err(e) = stream.shutdown().await {
                tracing::warn!(
                    addr = %self.addr,
                    error = %e,
                    "Failed to shutdown TCP stream (continuing anyway)"
                );
            }

            tracing::info!(addr = %self.addr, "TCP connection closed");
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn peer(&self) -> &str {
        &self.addr
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.stream.is_some() {
            tracing::debug!(addr = %self.addr, "TcpTransport dropped, closing connection");
        }
    }
}

/// Map a connection-time I/O error to the appropriate [`Error`] variant.
fn map_connect_error(e: std::io::Error, addr: &str) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionRefused => IoError::ConnectRefused(addr.to_string()).into(),
        _ => IoError::Os(e).into(),
    }
}

/// Map a data-path I/O error to the appropriate [`Error`] variant.
fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::ConnectionAborted => IoError::ConnectionClosed.into(),
        _ => IoError::Os(e).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn test_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn command_and_reply() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"< GET 1 BATT_BARS >");
            stream.write_all(b"< REP 1 BATT_BARS 004 >").await.unwrap();
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        assert!(transport.is_connected());
        assert_eq!(transport.peer(), addr);

        let n = transport.send(b"< GET 1 BATT_BARS >").await.unwrap();
        assert_eq!(n, 19);

        let mut buf = [0u8; 64];
        let n = transport
            .receive(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"< REP 1 BATT_BARS 004 >");

        transport.close().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn connect_timeout_to_blackholed_host() {
        // 192.0.2.0/24 is TEST-NET-1; packets are normally dropped.
        let result =
            TcpTransport::connect_with_timeout("192.0.2.1:2202", Duration::from_millis(100)).await;

        let err = result.unwrap_err();
        // Some network stacks fail fast with "unreachable" or reset the
        // attempt instead.
        assert!(
            matches!(
                err,
                Error::Io(IoError::ConnectTimeout | IoError::ConnectRefused(_) | IoError::Os(_))
            ),
            "expected ConnectTimeout, ConnectRefused or Os, got: {err:?}"
        );
    }

    #[tokio::test]
    async fn connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = TcpTransport::connect(&addr).await.unwrap_err();
        match err {
            Error::Io(IoError::ConnectRefused(a)) => assert_eq!(a, addr),
            other => panic!("expected ConnectRefused, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn receive_timeout() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();

        let mut buf = [0u8; 64];
        let result = transport
            .receive(&mut buf, Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(Error::Io(IoError::ReadTimeout))));

        transport.close().await.unwrap();
        server.abort();
    }

    #[tokio::test]
    async fn peer_close_is_connection_closed() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        server.await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut buf = [0u8; 64];
        let result = transport.receive(&mut buf, Duration::from_secs(2)).await;
        assert!(
            matches!(result, Err(Error::Io(IoError::ConnectionClosed))),
            "expected ConnectionClosed, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn io_after_close_returns_not_connected() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut transport = TcpTransport::connect(&addr).await.unwrap();
        transport.close().await.unwrap();
        assert!(!transport.is_connected());

        // Closing again is a no-op.
        transport.close().await.unwrap();

        let result = transport.send(b"< GET 1 TX_TYPE >").await;
        assert!(matches!(result, Err(Error::Io(IoError::NotConnected))));

        let mut buf = [0u8; 64];
        let result = transport.receive(&mut buf, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::Io(IoError::NotConnected))));

        server.abort();
    }

    #[tokio::test]
    async fn from_stream_works() {
        let (listener, addr) = test_listener().await;

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"< REP 1 RF_INT_DET NONE >").await.unwrap();
        });

        let raw = TcpStream::connect(&addr).await.unwrap();
        let mut transport = TcpTransport::from_stream(raw, addr.clone());
        assert_eq!(transport.addr(), addr);

        let mut buf = [0u8; 64];
        let n = transport
            .receive(&mut buf, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"< REP 1 RF_INT_DET NONE >");

        server.await.unwrap();
    }
}
