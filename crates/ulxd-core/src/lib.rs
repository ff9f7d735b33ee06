//! ulxd-core: Core traits, types, and error definitions for ulxd.
//!
//! This crate defines the pieces every other ulxd crate agrees on: the
//! byte-level [`Transport`], the [`ConnectionSource`] the request/response
//! client borrows connections from, the unsolicited [`Report`] type, and
//! the decoded value types.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`ConnectionSource`] -- acquire / release / discard of connections
//! - [`Report`] -- one unsolicited status report
//! - [`Reading`] -- a measurement or a sentinel-decoded device condition
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod report;
pub mod source;
pub mod transport;
pub mod types;

pub use error::{Error, IoError, ParseError, Result};
pub use report::{Report, ReportKind};
pub use source::ConnectionSource;
pub use transport::Transport;
pub use types::*;
