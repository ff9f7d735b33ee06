//! Classification of unsolicited report frames.
//!
//! Each frame read on a report stream becomes exactly one [`Report`].
//! Classification matches on the parsed parameter token, so a value field
//! that happens to contain another parameter's name cannot change the
//! report kind. Numeric families are decoded through the shared tables in
//! [`sentinel`](crate::sentinel).

use tracing::debug;

use ulxd_core::report::{PARSE_ERROR, Report, ReportKind, UNRECOGNIZED_REPORT};
use ulxd_core::types::{Parameter, Reading};

use crate::protocol::{self, ParsedFrame};
use crate::sentinel::{self, SentinelTable};

/// Decode and classify one raw frame.
///
/// Frames that fail the grammar become `Error/ParseError` reports carrying
/// the frame text.
pub fn classify_bytes(raw: &[u8]) -> Report {
    match protocol::parse_frame_bytes(raw) {
        Ok(frame) => classify_frame(&frame),
        Err(e) => {
            debug!(error = %e, "report frame failed to parse");
            Report::error(
                PARSE_ERROR,
                format!("Error while parsing report: {e}"),
                String::from_utf8_lossy(raw),
            )
        }
    }
}

/// Classify a parsed frame by its parameter token.
pub fn classify_frame(frame: &ParsedFrame) -> Report {
    let Ok(parameter) = frame.parameter.parse::<Parameter>() else {
        return unrecognized(frame);
    };

    match parameter {
        Parameter::RfInterference => interference(frame),
        Parameter::TxType => power(frame),
        Parameter::BatteryCycle => numeric(
            frame,
            ReportKind::BatteryCycles,
            &sentinel::BATTERY_CYCLES,
            |ch, v| format!("Channel {ch} has {v} battery cycles"),
        ),
        Parameter::BatteryRunTime => numeric(
            frame,
            ReportKind::BatteryChargeMinutes,
            &sentinel::BATTERY_RUN_TIME,
            |ch, v| format!("Channel {ch} has {v} minutes left"),
        ),
        Parameter::BatteryCharge => numeric(
            frame,
            ReportKind::BatteryCharge,
            &sentinel::BATTERY_CHARGE,
            |ch, v| format!("Channel {ch} battery is at {v}%"),
        ),
        Parameter::BatteryBars => numeric(
            frame,
            ReportKind::BatteryBars,
            &sentinel::BATTERY_BARS,
            |ch, v| format!("Channel {ch} battery shows {v} bars"),
        ),
        Parameter::BatteryType => battery_type(frame),
        Parameter::GroupChannel | Parameter::TxRfPower => unrecognized(frame),
    }
}

fn report(frame: &ParsedFrame, kind: ReportKind, value: &str, message: String) -> Report {
    Report {
        kind,
        channel: frame.channel,
        value: value.to_string(),
        message,
        full_report: frame.raw.clone(),
    }
}

fn unrecognized(frame: &ParsedFrame) -> Report {
    Report::error(
        UNRECOGNIZED_REPORT,
        format!("Encountered an unrecognized report: {}", frame.raw),
        frame.raw.clone(),
    )
}

fn channel_label(frame: &ParsedFrame) -> String {
    match frame.channel {
        Some(c) => c.to_string(),
        None => "?".to_string(),
    }
}

fn interference(frame: &ParsedFrame) -> Report {
    let ch = channel_label(frame);
    match frame.value.as_str() {
        "NONE" => report(
            frame,
            ReportKind::Interference,
            "NONE",
            format!("No interference on channel {ch}"),
        ),
        "CRITICAL" => report(
            frame,
            ReportKind::Interference,
            "CRITICAL",
            format!("Interference on channel {ch}"),
        ),
        _ => Report::error(
            PARSE_ERROR,
            "Invalid value for interference report",
            frame.raw.clone(),
        ),
    }
}

fn power(frame: &ParsedFrame) -> Report {
    if frame.value.contains("UNKN") {
        report(
            frame,
            ReportKind::Power,
            "STANDBY",
            "Power is in standby mode".to_string(),
        )
    } else {
        report(frame, ReportKind::Power, "ON", "Power is on".to_string())
    }
}

fn battery_type(frame: &ParsedFrame) -> Report {
    let ch = channel_label(frame);
    if frame.value == "UNKN" {
        report(
            frame,
            ReportKind::BatteryType,
            "UNKNOWN",
            format!("Channel {ch} has an unknown battery type"),
        )
    } else {
        report(
            frame,
            ReportKind::BatteryType,
            &frame.value,
            format!("Channel {ch} has a {} battery type", frame.value),
        )
    }
}

/// Decode a numeric family. An empty value reads as zero.
fn numeric(
    frame: &ParsedFrame,
    kind: ReportKind,
    table: &SentinelTable,
    describe: impl Fn(&str, &str) -> String,
) -> Report {
    let ch = channel_label(frame);
    let reading = if frame.value.is_empty() {
        Ok(Reading::Value(0))
    } else {
        table.decode(&frame.value)
    };

    match reading {
        Ok(Reading::Value(n)) => {
            let value = n.to_string();
            let message = describe(&ch, &value);
            report(frame, kind, &value, message)
        }
        Ok(condition) => {
            let value = condition.to_string();
            let message = format!(
                "Channel {ch} {} is {}",
                table.family(),
                condition_text(condition)
            );
            report(frame, kind, &value, message)
        }
        Err(e) => Report::error(
            PARSE_ERROR,
            format!("Error while parsing {kind} report: {e}"),
            frame.raw.clone(),
        ),
    }
}

fn condition_text(reading: Reading<u32>) -> &'static str {
    match reading {
        Reading::Off => "off",
        Reading::Calculating => "calculating",
        Reading::DeviceError => "reporting a device error",
        Reading::Unknown => "unknown",
        Reading::Value(_) => "known",
    }
}
