//! Frame codec for the bracket-delimited receiver protocol.
//!
//! Every protocol unit is an ASCII frame that starts with `<` and ends with
//! `>`. Commands, replies, and unsolicited reports share one shape:
//!
//! ```text
//! < GET <channel> <PARAMETER> >            command
//! < REP <channel> <PARAMETER> <value> >    reply or report
//! ```
//!
//! Frames are never length-prefixed or newline-terminated; a reader scans
//! for the `>` byte ([`split_frame`]). Nothing in this module performs I/O.

use bytes::{BufMut, BytesMut};

use ulxd_core::error::ParseError;

/// The byte that opens every frame.
pub const FRAME_START: u8 = b'<';

/// The byte that terminates every frame.
pub const TERMINATOR: u8 = b'>';

/// Keyword of an outbound query.
pub const GET_KEYWORD: &str = "GET";

/// Keyword of a reply or report.
pub const REPLY_KEYWORD: &str = "REP";

/// TCP port the receiver listens on.
pub const DEFAULT_PORT: u16 = 2202;

/// Upper bound on bytes buffered while waiting for a terminator.
/// Real frames are well under 100 bytes.
pub const MAX_FRAME_LEN: usize = 8192;

/// An outbound query frame. Built once per call and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    channel: u32,
    parameter: String,
    raw: Vec<u8>,
}

impl Command {
    /// Build a `< GET <channel> <parameter> >` query.
    pub fn get(channel: u32, parameter: impl AsRef<str>) -> Self {
        let parameter = parameter.as_ref().to_string();
        let raw = build_command(channel, &parameter);
        Command {
            channel,
            parameter,
            raw,
        }
    }

    /// The receiver channel the command addresses.
    pub fn channel(&self) -> u32 {
        self.channel
    }

    /// The parameter token the command queries.
    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    /// The frame bytes to put on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}

/// One decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame {
    /// Channel token, absent for frames that carry none (e.g. error frames).
    pub channel: Option<u32>,
    /// Parameter token (`BATT_CHARGE`, `TX_TYPE`, ...).
    pub parameter: String,
    /// Everything after the parameter token, whitespace-trimmed. May be empty.
    pub value: String,
    /// The frame exactly as received.
    pub raw: String,
}

impl ParsedFrame {
    /// Check that this frame answers a query for `parameter` on `channel`
    /// and return its value.
    ///
    /// A frame without a channel token is accepted for any channel.
    pub fn expect(&self, channel: u32, parameter: &str) -> Result<&str, ParseError> {
        if self.parameter != parameter {
            return Err(ParseError::ParameterMismatch {
                expected: parameter.to_string(),
                raw: self.raw.clone(),
            });
        }
        if self.channel.is_some_and(|c| c != channel) {
            return Err(ParseError::ParameterMismatch {
                expected: format!("{parameter} on channel {channel}"),
                raw: self.raw.clone(),
            });
        }
        Ok(&self.value)
    }
}

/// Result of scanning a byte buffer for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSplit<'a> {
    /// A terminator was found.
    Frame {
        /// The frame bytes, leading inter-frame whitespace removed, up to
        /// and including `>`.
        frame: &'a [u8],
        /// Bytes to drain from the buffer, including the skipped whitespace.
        consumed: usize,
    },

    /// No terminator yet. More data is needed.
    Incomplete,
}

/// Encode a query frame: `< GET <channel> <parameter> >`.
///
/// Single spaces separate the tokens and there is no trailing newline. The
/// parameter name is not validated.
///
/// # Example
///
/// ```
/// use ulxd_text_io::protocol::build_command;
///
/// assert_eq!(build_command(1, "BATT_CHARGE"), b"< GET 1 BATT_CHARGE >");
/// ```
pub fn build_command(channel: u32, parameter: &str) -> Vec<u8> {
    encode_frame(GET_KEYWORD, channel, parameter, "")
}

/// Encode a reply frame: `< REP <channel> <parameter> <value> >`.
///
/// This is what the receiver sends; the driver only needs it to script
/// devices in tests.
pub fn build_reply(channel: u32, parameter: &str, value: &str) -> Vec<u8> {
    encode_frame(REPLY_KEYWORD, channel, parameter, value)
}

fn encode_frame(keyword: &str, channel: u32, parameter: &str, value: &str) -> Vec<u8> {
    let channel = channel.to_string();
    let capacity = keyword.len() + channel.len() + parameter.len() + value.len() + 8;
    let mut buf = BytesMut::with_capacity(capacity);
    buf.put_u8(FRAME_START);
    for token in [keyword, channel.as_str(), parameter, value] {
        if token.is_empty() {
            continue;
        }
        buf.put_u8(b' ');
        buf.put_slice(token.as_bytes());
    }
    buf.put_slice(b" >");
    buf.to_vec()
}

/// Find the next complete frame in `buf`.
///
/// Whitespace left between frames (the receiver may separate reports with
/// spaces or line breaks) is skipped and counted in `consumed`.
pub fn split_frame(buf: &[u8]) -> FrameSplit<'_> {
    let term_pos = match buf.iter().position(|&b| b == TERMINATOR) {
        Some(pos) => pos,
        None => return FrameSplit::Incomplete,
    };

    let start = buf[..term_pos]
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(term_pos);

    FrameSplit::Frame {
        frame: &buf[start..=term_pos],
        consumed: term_pos + 1,
    }
}

/// Parse one frame from raw bytes. Non-UTF-8 input is malformed.
pub fn parse_frame_bytes(raw: &[u8]) -> Result<ParsedFrame, ParseError> {
    match std::str::from_utf8(raw) {
        Ok(s) => parse_frame(s),
        Err(_) => Err(ParseError::MalformedFrame {
            raw: String::from_utf8_lossy(raw).into_owned(),
            reason: "not valid UTF-8",
        }),
    }
}

/// Parse one frame.
///
/// Grammar: `<`, an optional `REP` keyword, an optional numeric channel, a
/// parameter token of uppercase letters, underscores and commas, then
/// free-form value text, then `>`. Whitespace between tokens is
/// insignificant. An empty value is valid.
///
/// # Example
///
/// ```
/// use ulxd_text_io::protocol::parse_frame;
///
/// let frame = parse_frame("< REP 1 GROUP_CHAN 2,14 >").unwrap();
/// assert_eq!(frame.channel, Some(1));
/// assert_eq!(frame.parameter, "GROUP_CHAN");
/// assert_eq!(frame.value, "2,14");
/// ```
pub fn parse_frame(raw: &str) -> Result<ParsedFrame, ParseError> {
    let malformed = |reason: &'static str| ParseError::MalformedFrame {
        raw: raw.to_string(),
        reason,
    };

    let body = raw
        .strip_prefix(FRAME_START as char)
        .ok_or_else(|| malformed("missing '<'"))?;
    let body = body
        .strip_suffix(TERMINATOR as char)
        .ok_or_else(|| malformed("missing '>'"))?;

    let mut rest = body;

    let (token, after) = next_token(rest);
    if token == REPLY_KEYWORD {
        rest = after;
    }

    let mut channel = None;
    let (token, after) = next_token(rest);
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        let n = token
            .parse::<u32>()
            .map_err(|_| malformed("channel out of range"))?;
        channel = Some(n);
        rest = after;
    }

    let (parameter, after) = next_token(rest);
    if parameter.is_empty() {
        return Err(malformed("missing parameter"));
    }
    if !is_parameter_token(parameter) {
        return Err(malformed("invalid parameter token"));
    }

    Ok(ParsedFrame {
        channel,
        parameter: parameter.to_string(),
        value: after.trim().to_string(),
        raw: raw.to_string(),
    })
}

/// Split off the next whitespace-delimited token.
fn next_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    let end = s.find(|c: char| c.is_ascii_whitespace()).unwrap_or(s.len());
    (&s[..end], &s[end..])
}

fn is_parameter_token(token: &str) -> bool {
    token.bytes().any(|b| b.is_ascii_uppercase())
        && token
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b == b'_' || b == b',')
}
