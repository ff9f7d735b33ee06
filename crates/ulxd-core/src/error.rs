//! Error types for the ulxd driver.
//!
//! Failures fall into two families: I/O failures on the TCP link
//! ([`IoError`]) and decode failures on the bytes that came back
//! ([`ParseError`]). Both are wrapped by the crate-wide [`Error`].
//!
//! Device-reported conditions such as "transmitter off" or "calculating"
//! are *not* errors; they are successful decodes represented by
//! [`Reading`](crate::types::Reading).

/// A failure on the connection to the receiver.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// No connection could be established or borrowed before the deadline.
    #[error("timed out connecting to receiver")]
    ConnectTimeout,

    /// The receiver actively refused the connection.
    #[error("connection refused: {0}")]
    ConnectRefused(String),

    /// Fewer bytes were written than the command frame holds.
    #[error("short write: wrote {written} of {expected} bytes")]
    WriteShort {
        /// Bytes accepted by the socket.
        written: usize,
        /// Length of the command frame.
        expected: usize,
    },

    /// The command could not be written before the deadline.
    #[error("timed out writing command")]
    WriteTimeout,

    /// No complete reply arrived before the deadline.
    #[error("timed out waiting for reply")]
    ReadTimeout,

    /// The receiver closed the connection (end of stream).
    #[error("connection closed by receiver")]
    ConnectionClosed,

    /// The transport was used after it was closed.
    #[error("not connected")]
    NotConnected,

    /// The caller cancelled the operation before it completed.
    #[error("operation cancelled")]
    Cancelled,

    /// Any other operating-system level I/O failure.
    #[error("{0}")]
    Os(#[from] std::io::Error),
}

/// A failure decoding a frame or a value carried inside a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The bytes do not form a `< ... >` frame with a parameter token.
    #[error("malformed frame ({reason}): {raw:?}")]
    MalformedFrame {
        /// The offending frame text, verbatim.
        raw: String,
        /// Which part of the grammar failed.
        reason: &'static str,
    },

    /// The frame is well formed but its value is not what the parameter
    /// requires (e.g. non-numeric battery charge, bad group/channel pair).
    #[error("unexpected format: {0}")]
    UnexpectedFormat(String),

    /// The reply carries a different parameter or channel than the command.
    #[error("expected {expected} reply, got {raw:?}")]
    ParameterMismatch {
        /// The parameter (and channel) the command asked for.
        expected: String,
        /// The reply frame, verbatim.
        raw: String,
    },
}

/// The error type for all ulxd operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connection failed.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// The reply could not be decoded.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(IoError::Os(e))
    }
}

impl Error {
    /// Whether the connection that produced this error must be discarded
    /// rather than handed back for reuse.
    ///
    /// Any I/O failure leaves the stream in an unknown position (a late
    /// reply may still arrive), so every [`Error::Io`] is fatal. So is
    /// [`ParseError::ParameterMismatch`]: the frame read answered something
    /// else, and the real reply may still be on its way. Other parse
    /// failures happen after the expected frame was consumed, so the
    /// connection is still in sync.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Parse(ParseError::ParameterMismatch { .. })
        )
    }

    /// Returns the [`IoError`] if this is an I/O failure.
    pub fn as_io(&self) -> Option<&IoError> {
        match self {
            Error::Io(e) => Some(e),
            Error::Parse(_) => None,
        }
    }

    /// Returns the [`ParseError`] if this is a decode failure.
    pub fn as_parse(&self) -> Option<&ParseError> {
        match self {
            Error::Parse(e) => Some(e),
            Error::Io(_) => None,
        }
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
