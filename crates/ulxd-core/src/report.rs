//! Unsolicited report types.
//!
//! A receiver pushes status frames (battery state, RF interference, power
//! state) on a streaming connection. The report stream reader in
//! `ulxd-text-io` turns every frame it reads, and every failure it hits,
//! into one [`Report`] on its output queue.

use std::fmt;

/// Error value of the terminal report pushed when the receiver closes the
/// stream.
pub const CONNECTION_CLOSED: &str = "ConnectionClosedError";

/// Error value of a report carrying a non-fatal read failure.
pub const READ_ERROR: &str = "ReadError";

/// Error value of a report for a frame that failed to decode.
pub const PARSE_ERROR: &str = "ParseError";

/// Error value of a report for a well-formed frame with an unknown parameter.
pub const UNRECOGNIZED_REPORT: &str = "UnrecognizedReport";

/// What a [`Report`] is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    /// A read, decode, or classification failure; see [`Report::value`].
    Error,
    /// Battery charge cycle count (`BATT_CYCLE`).
    BatteryCycles,
    /// Battery run time in minutes (`BATT_RUN_TIME`).
    BatteryChargeMinutes,
    /// Installed battery chemistry (`BATT_TYPE`).
    BatteryType,
    /// RF interference detection (`RF_INT_DET`).
    Interference,
    /// Transmitter power state, inferred from `TX_TYPE`.
    Power,
    /// Battery charge percentage (`BATT_CHARGE`).
    BatteryCharge,
    /// Battery bar count (`BATT_BARS`).
    BatteryBars,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportKind::Error => "error",
            ReportKind::BatteryCycles => "battery cycles",
            ReportKind::BatteryChargeMinutes => "battery run time",
            ReportKind::BatteryType => "battery type",
            ReportKind::Interference => "interference",
            ReportKind::Power => "power",
            ReportKind::BatteryCharge => "battery charge",
            ReportKind::BatteryBars => "battery bars",
        };
        f.write_str(s)
    }
}

/// One decoded report, created by the stream reader and consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Classification of the report.
    pub kind: ReportKind,
    /// Receiver channel, `None` when the frame carried none or for stream
    /// level errors.
    pub channel: Option<u32>,
    /// Decoded value (`"CRITICAL"`, `"120"`, `"UNKNOWN"`, ...) or, for
    /// [`ReportKind::Error`], one of the error constants in this module.
    pub value: String,
    /// Human-readable description.
    pub message: String,
    /// The frame text as read off the wire; empty for stream-level errors.
    pub full_report: String,
}

impl Report {
    /// Build an error report.
    pub fn error(
        value: &str,
        message: impl Into<String>,
        full_report: impl Into<String>,
    ) -> Self {
        Report {
            kind: ReportKind::Error,
            channel: None,
            value: value.to_string(),
            message: message.into(),
            full_report: full_report.into(),
        }
    }

    /// The terminal report pushed once when the stream reaches end of file.
    pub fn connection_closed() -> Self {
        Report::error(
            CONNECTION_CLOSED,
            "The connection to the receiver was closed",
            "",
        )
    }

    /// Whether this is an error report.
    pub fn is_error(&self) -> bool {
        self.kind == ReportKind::Error
    }

    /// Whether this is the terminal end-of-stream report.
    pub fn is_connection_closed(&self) -> bool {
        self.kind == ReportKind::Error && self.value == CONNECTION_CLOSED
    }
}
