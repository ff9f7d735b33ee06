//! # ulxd -- control driver for ULX-D style wireless receivers
//!
//! `ulxd` is an asynchronous client for the bracket-delimited text protocol
//! that wireless microphone receivers speak on TCP port 2202. It queries
//! per-channel state (battery, group/channel, RF power, transmitter type)
//! and consumes the status reports the receiver pushes on its own.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ulxd::{Reading, ReceiverBuilder};
//!
//! #[tokio::main]
//! async fn main() -> ulxd::Result<()> {
//!     let rx = ReceiverBuilder::new("192.168.1.50").build();
//!
//!     match rx.battery_charge(1).await? {
//!         Reading::Value(pct) => println!("channel 1: {pct}%"),
//!         Reading::Off => println!("channel 1: transmitter off"),
//!         other => println!("channel 1: {other}"),
//!     }
//!
//!     let mut reports = rx.start_reporting().await?;
//!     while let Some(report) = reports.recv().await {
//!         println!("{:?} {}: {}", report.kind, report.value, report.message);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate               | Purpose                                            |
//! |---------------------|----------------------------------------------------|
//! | `ulxd-core`         | Errors, traits, [`Report`], semantic value types   |
//! | `ulxd-text-io`      | Frame codec, sentinel tables, client, report stream |
//! | `ulxd-transport`    | TCP transport and dial-on-demand connection source |
//! | **`ulxd`**          | This facade crate: [`Receiver`] and its builder    |

pub mod builder;
pub mod commands;
pub mod receiver;

pub use builder::ReceiverBuilder;
pub use receiver::{Receiver, start_reporting};

pub use ulxd_core::*;
pub use ulxd_text_io::{
    Client, Command, DEFAULT_REPORT_CAPACITY, DEFAULT_TIMEOUT, ParsedFrame, ReportStream,
    StreamState,
};
pub use ulxd_text_io::protocol::DEFAULT_PORT;
pub use ulxd_transport::{TcpConnectionSource, TcpTransport};
