//! Core types used throughout ulxd.
//!
//! The command vocabulary of the receiver is fixed and small, so it is
//! modelled as the closed [`Parameter`] enum. Decoded values are wrapped in
//! [`Reading`] whenever the receiver can answer with a sentinel code
//! instead of a measurement.

use std::fmt;
use std::str::FromStr;

/// A parameter token understood by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parameter {
    /// Battery charge percentage.
    BatteryCharge,
    /// Remaining battery run time in minutes.
    BatteryRunTime,
    /// Installed battery chemistry.
    BatteryType,
    /// Battery bar count shown on the front panel.
    BatteryBars,
    /// Battery charge cycle count.
    BatteryCycle,
    /// Frequency group and channel.
    GroupChannel,
    /// Transmitter RF power level.
    TxRfPower,
    /// Transmitter model; `UNKN` while no transmitter is linked.
    TxType,
    /// RF interference detection.
    RfInterference,
}

impl Parameter {
    /// Every parameter the driver knows about.
    pub const ALL: [Parameter; 9] = [
        Parameter::BatteryCharge,
        Parameter::BatteryRunTime,
        Parameter::BatteryType,
        Parameter::BatteryBars,
        Parameter::BatteryCycle,
        Parameter::GroupChannel,
        Parameter::TxRfPower,
        Parameter::TxType,
        Parameter::RfInterference,
    ];

    /// The wire token for this parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::BatteryCharge => "BATT_CHARGE",
            Parameter::BatteryRunTime => "BATT_RUN_TIME",
            Parameter::BatteryType => "BATT_TYPE",
            Parameter::BatteryBars => "BATT_BARS",
            Parameter::BatteryCycle => "BATT_CYCLE",
            Parameter::GroupChannel => "GROUP_CHAN",
            Parameter::TxRfPower => "TX_RF_PWR",
            Parameter::TxType => "TX_TYPE",
            Parameter::RfInterference => "RF_INT_DET",
        }
    }
}

impl AsRef<str> for Parameter {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known [`Parameter`] token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseParameterError(String);

impl fmt::Display for ParseParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown parameter: {}", self.0)
    }
}

impl std::error::Error for ParseParameterError {}

impl FromStr for Parameter {
    type Err = ParseParameterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Parameter::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParseParameterError(s.to_string()))
    }
}

/// A decoded measurement, or the device condition reported in its place.
///
/// The receiver reports conditions such as "transmitter off" by sending
/// reserved sentinel codes in the value field. Those are successful
/// decodes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reading<T> {
    /// A real measurement.
    Value(T),
    /// The transmitter is off.
    Off,
    /// The transmitter is still calculating the value.
    Calculating,
    /// The transmitter reported an unspecified error code.
    DeviceError,
    /// The transmitter does not know the value.
    Unknown,
}

impl<T> Reading<T> {
    /// The measurement, if there is one.
    pub fn value(self) -> Option<T> {
        match self {
            Reading::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this is a real measurement.
    pub fn is_value(&self) -> bool {
        matches!(self, Reading::Value(_))
    }

    /// Map the measurement, keeping the condition variants.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reading<U> {
        match self {
            Reading::Value(v) => Reading::Value(f(v)),
            Reading::Off => Reading::Off,
            Reading::Calculating => Reading::Calculating,
            Reading::DeviceError => Reading::DeviceError,
            Reading::Unknown => Reading::Unknown,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Reading<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Value(v) => write!(f, "{v}"),
            Reading::Off => f.write_str("OFF"),
            Reading::Calculating => f.write_str("CALCULATING"),
            Reading::DeviceError => f.write_str("DEVICE_ERROR"),
            Reading::Unknown => f.write_str("UNKNOWN"),
        }
    }
}

/// Frequency group and channel of a receiver channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupChannel {
    /// The tuned frequency belongs to a group/channel preset.
    Assigned {
        /// Frequency group number.
        group: u32,
        /// Channel number within the group.
        channel: u32,
    },
    /// The tuned frequency does not line up with any group and channel
    /// (the receiver answers `--,--`).
    Unassigned,
}

impl fmt::Display for GroupChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupChannel::Assigned { group, channel } => write!(f, "{group},{channel}"),
            GroupChannel::Unassigned => f.write_str("--,--"),
        }
    }
}

/// Transmitter power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerStatus {
    /// A transmitter is linked and powered.
    On,
    /// No transmitter is reporting (`TX_TYPE` is `UNKN`).
    Standby,
}

impl fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerStatus::On => f.write_str("ON"),
            PowerStatus::Standby => f.write_str("STANDBY"),
        }
    }
}

/// Battery chemistry reported by `BATT_TYPE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BatteryType {
    /// Alkaline (`ALKA`).
    Alkaline,
    /// Rechargeable lithium-ion pack (`LION`).
    LithiumIon,
    /// Primary lithium cells (`LITH`).
    Lithium,
    /// Nickel-metal hydride (`NIMH`).
    NiMh,
    /// No battery information (`UNKN`).
    Unknown,
    /// Any other token, kept verbatim.
    Other(String),
}

impl BatteryType {
    /// Decode a `BATT_TYPE` value token.
    pub fn from_token(token: &str) -> Self {
        match token {
            "ALKA" => BatteryType::Alkaline,
            "LION" => BatteryType::LithiumIon,
            "LITH" => BatteryType::Lithium,
            "NIMH" => BatteryType::NiMh,
            "UNKN" => BatteryType::Unknown,
            other => BatteryType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for BatteryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatteryType::Alkaline => f.write_str("ALKA"),
            BatteryType::LithiumIon => f.write_str("LION"),
            BatteryType::Lithium => f.write_str("LITH"),
            BatteryType::NiMh => f.write_str("NIMH"),
            BatteryType::Unknown => f.write_str("UNKNOWN"),
            BatteryType::Other(s) => f.write_str(s),
        }
    }
}

/// Transmitter RF power level reported by `TX_RF_PWR`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TxRfPower {
    /// Low power (`LOW`).
    Low,
    /// Normal power (`NORMAL`).
    Normal,
    /// High power (`HIGH`).
    High,
    /// No transmitter information (`UNKN`).
    Unknown,
    /// Any other token, kept verbatim.
    Other(String),
}

impl TxRfPower {
    /// Decode a `TX_RF_PWR` value token.
    pub fn from_token(token: &str) -> Self {
        match token {
            "LOW" => TxRfPower::Low,
            "NORMAL" => TxRfPower::Normal,
            "HIGH" => TxRfPower::High,
            "UNKN" => TxRfPower::Unknown,
            other => TxRfPower::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TxRfPower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxRfPower::Low => f.write_str("LOW"),
            TxRfPower::Normal => f.write_str("NORMAL"),
            TxRfPower::High => f.write_str("HIGH"),
            TxRfPower::Unknown => f.write_str("UNKNOWN"),
            TxRfPower::Other(s) => f.write_str(s),
        }
    }
}
