//! Text protocol layer for the ulxd receiver driver.
//!
//! The receiver speaks bracket-delimited ASCII over TCP:
//! `< GET 1 BATT_CHARGE >` out, `< REP 1 BATT_CHARGE 087 >` back, and the
//! same reply shape for reports the receiver pushes on its own.
//!
//! # Architecture
//!
//! - [`protocol`]: frame building, splitting, and parsing; no I/O
//! - [`sentinel`]: per-family tables mapping reserved codes to [`Reading`](ulxd_core::Reading)s
//! - [`classify`]: turns a report frame into a typed [`Report`](ulxd_core::Report)
//! - [`client`]: one command, one reply, on a borrowed connection
//! - [`stream`]: background reader publishing reports in wire order

pub mod classify;
pub mod client;
pub mod protocol;
pub mod sentinel;
pub mod stream;

pub use client::{Client, DEFAULT_TIMEOUT};
pub use protocol::{Command, ParsedFrame};
pub use stream::{DEFAULT_REPORT_CAPACITY, ReportStream, StreamState};
