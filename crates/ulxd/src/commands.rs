//! Receiver command builders and reply decoders.
//!
//! One builder per parameter produces the [`Command`] to send; one decoder
//! per parameter turns the reply's value field into a typed result. All
//! functions are pure. Numeric families decode through the shared tables in
//! [`ulxd_text_io::sentinel`], so a facade query and a stream report for the
//! same parameter always agree.

use std::time::Duration;

use ulxd_core::error::ParseError;
use ulxd_core::types::{BatteryType, GroupChannel, Parameter, PowerStatus, Reading, TxRfPower};
use ulxd_text_io::protocol::{Command, ParsedFrame};
use ulxd_text_io::sentinel::{self, SentinelTable};

type Result<T> = std::result::Result<T, ParseError>;

/// Reply value meaning "no group/channel preset at this frequency".
pub const GROUP_CHANNEL_UNASSIGNED: &str = "--,--";

/// `TX_TYPE` value reported while no transmitter is linked.
pub const TX_TYPE_UNKNOWN: &str = "UNKN";

// ---------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------

/// `< GET {channel} BATT_CHARGE >`
pub fn cmd_battery_charge(channel: u32) -> Command {
    Command::get(channel, Parameter::BatteryCharge)
}

/// `< GET {channel} BATT_RUN_TIME >`
pub fn cmd_battery_run_time(channel: u32) -> Command {
    Command::get(channel, Parameter::BatteryRunTime)
}

/// `< GET {channel} BATT_TYPE >`
pub fn cmd_battery_type(channel: u32) -> Command {
    Command::get(channel, Parameter::BatteryType)
}

/// `< GET {channel} BATT_BARS >`
pub fn cmd_battery_bars(channel: u32) -> Command {
    Command::get(channel, Parameter::BatteryBars)
}

/// `< GET {channel} BATT_CYCLE >`
pub fn cmd_battery_cycles(channel: u32) -> Command {
    Command::get(channel, Parameter::BatteryCycle)
}

/// `< GET {channel} GROUP_CHAN >`
pub fn cmd_group_channel(channel: u32) -> Command {
    Command::get(channel, Parameter::GroupChannel)
}

/// `< GET {channel} TX_RF_PWR >`
pub fn cmd_tx_rf_power(channel: u32) -> Command {
    Command::get(channel, Parameter::TxRfPower)
}

/// `< GET {channel} TX_TYPE >`, also used to infer the power state.
pub fn cmd_tx_type(channel: u32) -> Command {
    Command::get(channel, Parameter::TxType)
}

// ---------------------------------------------------------------
// Reply decoders
// ---------------------------------------------------------------

/// Check that `frame` answers `command` and return its value field.
///
/// # Errors
///
/// Returns [`ParseError::ParameterMismatch`] if the reply carries another
/// parameter or channel.
pub fn reply_value<'a>(frame: &'a ParsedFrame, command: &Command) -> Result<&'a str> {
    frame.expect(command.channel(), command.parameter())
}

fn decode_u8(table: &SentinelTable, value: &str) -> Result<Reading<u8>> {
    match table.decode(value)? {
        Reading::Value(n) => u8::try_from(n).map(Reading::Value).map_err(|_| {
            ParseError::UnexpectedFormat(format!("{} out of range: {n}", table.family()))
        }),
        condition => Ok(condition.map(|_| 0)),
    }
}

/// Decode a `BATT_CHARGE` value (percent).
///
/// `255` is [`Reading::Off`], `254` [`Reading::Calculating`], `253` and `252`
/// [`Reading::DeviceError`].
pub fn parse_battery_charge(value: &str) -> Result<Reading<u8>> {
    decode_u8(&sentinel::BATTERY_CHARGE, value)
}

/// Decode a `BATT_RUN_TIME` value (minutes) into a duration.
pub fn parse_battery_run_time(value: &str) -> Result<Reading<Duration>> {
    Ok(sentinel::BATTERY_RUN_TIME
        .decode(value)?
        .map(|minutes| Duration::from_secs(u64::from(minutes) * 60)))
}

/// Decode a `BATT_BARS` value.
pub fn parse_battery_bars(value: &str) -> Result<Reading<u8>> {
    decode_u8(&sentinel::BATTERY_BARS, value)
}

/// Decode a `BATT_CYCLE` value. `65535` is [`Reading::Unknown`].
pub fn parse_battery_cycles(value: &str) -> Result<Reading<u32>> {
    sentinel::BATTERY_CYCLES.decode(value)
}

/// Decode a `BATT_TYPE` value.
pub fn parse_battery_type(value: &str) -> Result<BatteryType> {
    let token = value.trim();
    if token.is_empty() {
        return Err(ParseError::UnexpectedFormat("empty battery type".into()));
    }
    Ok(BatteryType::from_token(token))
}

/// Decode a `GROUP_CHAN` value.
///
/// `--,--` is [`GroupChannel::Unassigned`]. Anything else must be exactly
/// two comma-separated non-negative integers.
///
/// # Errors
///
/// Returns [`ParseError::UnexpectedFormat`] for any other value.
pub fn parse_group_channel(value: &str) -> Result<GroupChannel> {
    let value = value.trim();
    if value == GROUP_CHANNEL_UNASSIGNED {
        return Ok(GroupChannel::Unassigned);
    }

    let bad = || ParseError::UnexpectedFormat(format!("invalid group/channel: {value:?}"));
    let (group, channel) = value.split_once(',').ok_or_else(bad)?;
    let group = group.trim().parse::<u32>().map_err(|_| bad())?;
    let channel = channel.trim().parse::<u32>().map_err(|_| bad())?;
    Ok(GroupChannel::Assigned { group, channel })
}

/// Decode a `TX_RF_PWR` value.
pub fn parse_tx_rf_power(value: &str) -> Result<TxRfPower> {
    let token = value.trim();
    if token.is_empty() {
        return Err(ParseError::UnexpectedFormat("empty RF power".into()));
    }
    Ok(TxRfPower::from_token(token))
}

/// Decode a `TX_TYPE` value: the transmitter model, verbatim.
pub fn parse_tx_type(value: &str) -> Result<String> {
    let token = value.trim();
    if token.is_empty() {
        return Err(ParseError::UnexpectedFormat("empty transmitter type".into()));
    }
    Ok(token.to_string())
}

/// Infer the power state from a `TX_TYPE` reply.
///
/// A value containing `UNKN` means standby; any other value means on.
///
/// # Errors
///
/// Returns [`ParseError::ParameterMismatch`] if the reply is not a
/// `TX_TYPE` reply for `channel`.
pub fn parse_power_status(frame: &ParsedFrame, channel: u32) -> Result<PowerStatus> {
    let value = frame.expect(channel, Parameter::TxType.as_str())?;
    if value.contains(TX_TYPE_UNKNOWN) {
        Ok(PowerStatus::Standby)
    } else {
        Ok(PowerStatus::On)
    }
}
