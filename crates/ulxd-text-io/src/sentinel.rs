//! Sentinel decoding for numeric parameter families.
//!
//! The receiver reports device conditions by sending reserved codes in the
//! value field of a numeric parameter: a battery charge of `255` means the
//! transmitter is off, not that it is at 255%. Each parameter family has
//! one fixed [`SentinelTable`]; every call site that decodes that family
//! (facade queries and stream reports alike) goes through the same table.
//!
//! | Family          | Code          | Meaning                   |
//! |-----------------|---------------|---------------------------|
//! | battery charge  | 255           | [`Reading::Off`]          |
//! |                 | 254           | [`Reading::Calculating`]  |
//! |                 | 253, 252      | [`Reading::DeviceError`]  |
//! | battery runtime | 65535         | [`Reading::Off`]          |
//! |                 | 65534         | [`Reading::Calculating`]  |
//! |                 | 65533, 65532  | [`Reading::DeviceError`]  |
//! | battery bars    | 255           | [`Reading::Off`]          |
//! |                 | 254           | [`Reading::Calculating`]  |
//! | battery cycles  | 65535         | [`Reading::Unknown`]      |
//!
//! Any other number is the literal measurement.

use ulxd_core::error::ParseError;
use ulxd_core::types::{Parameter, Reading};

/// Sentinel codes for one parameter family.
#[derive(Debug)]
pub struct SentinelTable {
    family: &'static str,
    codes: &'static [(u32, Reading<u32>)],
}

/// Battery charge percentage (`BATT_CHARGE`).
pub static BATTERY_CHARGE: SentinelTable = SentinelTable {
    family: "battery charge",
    codes: &[
        (255, Reading::Off),
        (254, Reading::Calculating),
        (253, Reading::DeviceError),
        (252, Reading::DeviceError),
    ],
};

/// Battery run time in minutes (`BATT_RUN_TIME`).
pub static BATTERY_RUN_TIME: SentinelTable = SentinelTable {
    family: "battery run time",
    codes: &[
        (65535, Reading::Off),
        (65534, Reading::Calculating),
        (65533, Reading::DeviceError),
        (65532, Reading::DeviceError),
    ],
};

/// Battery bar count (`BATT_BARS`).
pub static BATTERY_BARS: SentinelTable = SentinelTable {
    family: "battery bars",
    codes: &[(255, Reading::Off), (254, Reading::Calculating)],
};

/// Battery charge cycles (`BATT_CYCLE`).
pub static BATTERY_CYCLES: SentinelTable = SentinelTable {
    family: "battery cycles",
    codes: &[(65535, Reading::Unknown)],
};

impl SentinelTable {
    /// The table for a parameter, if the parameter is a numeric family.
    pub fn for_parameter(parameter: Parameter) -> Option<&'static SentinelTable> {
        match parameter {
            Parameter::BatteryCharge => Some(&BATTERY_CHARGE),
            Parameter::BatteryRunTime => Some(&BATTERY_RUN_TIME),
            Parameter::BatteryBars => Some(&BATTERY_BARS),
            Parameter::BatteryCycle => Some(&BATTERY_CYCLES),
            _ => None,
        }
    }

    /// Human-readable family name, used in error messages.
    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Map a number to its reading.
    pub fn classify(&self, code: u32) -> Reading<u32> {
        self.codes
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, reading)| *reading)
            .unwrap_or(Reading::Value(code))
    }

    /// Parse a value token as a number and map it to its reading.
    ///
    /// Fails with [`ParseError::UnexpectedFormat`] if the token is not a
    /// non-negative integer.
    pub fn decode(&self, value: &str) -> Result<Reading<u32>, ParseError> {
        let value = value.trim();
        let code = value.parse::<u32>().map_err(|_| {
            ParseError::UnexpectedFormat(format!("{} is not a number: {value:?}", self.family))
        })?;
        Ok(self.classify(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battery_charge_sentinels() {
        assert_eq!(BATTERY_CHARGE.classify(255), Reading::Off);
        assert_eq!(BATTERY_CHARGE.classify(254), Reading::Calculating);
        assert_eq!(BATTERY_CHARGE.classify(253), Reading::DeviceError);
        assert_eq!(BATTERY_CHARGE.classify(252), Reading::DeviceError);
    }

    #[test]
    fn battery_charge_percentages_pass_through() {
        for n in 0..=100 {
            assert_eq!(BATTERY_CHARGE.classify(n), Reading::Value(n));
        }
    }

    #[test]
    fn battery_run_time_sentinels() {
        assert_eq!(BATTERY_RUN_TIME.classify(65535), Reading::Off);
        assert_eq!(BATTERY_RUN_TIME.classify(65534), Reading::Calculating);
        assert_eq!(BATTERY_RUN_TIME.classify(65533), Reading::DeviceError);
        assert_eq!(BATTERY_RUN_TIME.classify(65532), Reading::DeviceError);
        assert_eq!(BATTERY_RUN_TIME.classify(65531), Reading::Value(65531));
        assert_eq!(BATTERY_RUN_TIME.classify(255), Reading::Value(255));
        assert_eq!(BATTERY_RUN_TIME.classify(0), Reading::Value(0));
    }

    #[test]
    fn battery_bars_sentinels() {
        assert_eq!(BATTERY_BARS.classify(255), Reading::Off);
        assert_eq!(BATTERY_BARS.classify(254), Reading::Calculating);
        assert_eq!(BATTERY_BARS.classify(253), Reading::Value(253));
        assert_eq!(BATTERY_BARS.classify(5), Reading::Value(5));
    }

    #[test]
    fn battery_cycles_sentinel() {
        assert_eq!(BATTERY_CYCLES.classify(65535), Reading::Unknown);
        assert_eq!(BATTERY_CYCLES.classify(65534), Reading::Value(65534));
        assert_eq!(BATTERY_CYCLES.classify(42), Reading::Value(42));
    }

    #[test]
    fn decode_trims_and_parses() {
        assert_eq!(BATTERY_CHARGE.decode(" 087 "), Ok(Reading::Value(87)));
        assert_eq!(BATTERY_CHARGE.decode("254"), Ok(Reading::Calculating));
    }

    #[test]
    fn decode_rejects_non_numeric() {
        for bad in ["", "abc", "-1", "12.5", "1 2"] {
            assert!(
                matches!(
                    BATTERY_RUN_TIME.decode(bad),
                    Err(ParseError::UnexpectedFormat(_))
                ),
                "{bad:?} should not decode"
            );
        }
    }

    #[test]
    fn tables_by_parameter() {
        assert_eq!(
            SentinelTable::for_parameter(Parameter::BatteryCharge).map(|t| t.family()),
            Some("battery charge")
        );
        assert_eq!(
            SentinelTable::for_parameter(Parameter::BatteryCycle).map(|t| t.family()),
            Some("battery cycles")
        );
        assert!(SentinelTable::for_parameter(Parameter::TxType).is_none());
    }
}
