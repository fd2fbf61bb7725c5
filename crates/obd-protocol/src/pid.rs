//! Manufacturer PID Signals and Decoding
//!
//! Each signal reads fixed offsets from the 8-byte response payload, where
//! offset 0 is the length byte and signal data starts at offset 4.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw gear byte the TCM reports for reverse
const GEAR_REVERSE: u8 = 0x10;
/// Raw gear byte the TCM reports for neutral
const GEAR_NEUTRAL: u8 = 0x00;

/// Signals decoded from the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    /// Engine speed (rpm)
    EngineRpm,
    /// Currently engaged gear
    Gear,
    /// Engine oil temperature (°C)
    EngineOilTemp,
    /// Intelligent battery sensor state of charge (%)
    BatteryIbs,
    /// Battery voltage (V)
    BatteryVoltage,
    /// Atmospheric pressure (mbar)
    AtmosphericPressure,
    /// Boost pressure (mbar)
    BoostPressure,
    /// External air temperature (°C)
    ExternalTemp,
}

/// Transmission gear as reported by the TCM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gear {
    Neutral,
    Reverse,
    Numbered(u8),
}

impl Gear {
    /// Interpret the raw TCM gear byte
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            GEAR_REVERSE => Gear::Reverse,
            GEAR_NEUTRAL => Gear::Neutral,
            n => Gear::Numbered(n),
        }
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gear::Neutral => f.write_str("Neutral"),
            Gear::Reverse => f.write_str("Reverse"),
            Gear::Numbered(n) => write!(f, "{n}"),
        }
    }
}

/// A decoded value in physical units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum Reading {
    Rpm(u32),
    Gear(Gear),
    Celsius(i32),
    Percent(u8),
    Volts(f32),
    Millibar(u32),
}

/// Convert Celsius to Fahrenheit, rounding half up before truncation
pub fn celsius_to_fahrenheit(celsius: i32) -> i32 {
    (celsius as f32 * 9.0 / 5.0 + 32.0 + 0.5) as i32
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Rpm(rpm) => write!(f, "{rpm}"),
            Reading::Gear(gear) => write!(f, "{gear}"),
            Reading::Celsius(c) => write!(f, "{c} °C ({} °F)", celsius_to_fahrenheit(*c)),
            Reading::Percent(p) => write!(f, "{p} %"),
            Reading::Volts(v) => write!(f, "{v:.1} Volts"),
            Reading::Millibar(mbar) => write!(f, "{mbar} mbar"),
        }
    }
}

/// Capability shared by every decodable signal
pub trait DecodableSignal {
    /// Human readable signal name
    fn name(&self) -> &'static str;

    /// Decode a response payload. Total: bytes past the end read as zero.
    fn decode(&self, payload: &[u8]) -> Reading;

    /// One line of human readable text for a decoded value
    fn report(&self, reading: &Reading) -> String {
        format!("{} = {}", self.name(), reading)
    }
}

fn byte_at(payload: &[u8], offset: usize) -> u8 {
    payload.get(offset).copied().unwrap_or(0)
}

fn word_at(payload: &[u8], offset: usize) -> u32 {
    u16::from_be_bytes([byte_at(payload, offset), byte_at(payload, offset + 1)]) as u32
}

impl DecodableSignal for Signal {
    fn name(&self) -> &'static str {
        match self {
            Signal::EngineRpm => "Engine RPM",
            Signal::Gear => "Current Engaged Gear",
            Signal::EngineOilTemp => "Engine Oil Temperature",
            Signal::BatteryIbs => "Battery IBS",
            Signal::BatteryVoltage => "Battery",
            Signal::AtmosphericPressure => "Atmospheric Pressure",
            Signal::BoostPressure => "Boost Pressure",
            Signal::ExternalTemp => "External Temperature",
        }
    }

    fn decode(&self, payload: &[u8]) -> Reading {
        match self {
            // (A*256 + B) / 4
            Signal::EngineRpm => Reading::Rpm(word_at(payload, 4) / 4),
            Signal::Gear => Reading::Gear(Gear::from_raw(byte_at(payload, 4))),
            Signal::EngineOilTemp => Reading::Celsius(byte_at(payload, 5) as i32),
            Signal::BatteryIbs => Reading::Percent(byte_at(payload, 4)),
            Signal::BatteryVoltage => Reading::Volts(byte_at(payload, 5) as f32 / 10.0),
            Signal::AtmosphericPressure | Signal::BoostPressure => {
                Reading::Millibar(word_at(payload, 4))
            }
            // A/2 - 40, integer halving
            Signal::ExternalTemp => Reading::Celsius((byte_at(payload, 4) / 2) as i32 - 40),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(b4: u8, b5: u8) -> [u8; 8] {
        [0x05, 0x62, 0x00, 0x00, b4, b5, 0xAA, 0xAA]
    }

    #[test]
    fn test_rpm_decode() {
        let reading = Signal::EngineRpm.decode(&payload(0x1F, 0x40));
        assert_eq!(reading, Reading::Rpm(2000));
        assert_eq!(Signal::EngineRpm.report(&reading), "Engine RPM = 2000");
    }

    #[test]
    fn test_gear_decode() {
        assert_eq!(Signal::Gear.decode(&payload(0x10, 0)), Reading::Gear(Gear::Reverse));
        assert_eq!(Signal::Gear.decode(&payload(0x00, 0)), Reading::Gear(Gear::Neutral));
        assert_eq!(Signal::Gear.decode(&payload(0x03, 0)), Reading::Gear(Gear::Numbered(3)));
        assert_eq!(
            Signal::Gear.report(&Reading::Gear(Gear::Reverse)),
            "Current Engaged Gear = Reverse"
        );
    }

    #[test]
    fn test_oil_temp_decode() {
        let reading = Signal::EngineOilTemp.decode(&payload(0x00, 0x5A));
        assert_eq!(reading, Reading::Celsius(90));
        assert_eq!(
            Signal::EngineOilTemp.report(&reading),
            "Engine Oil Temperature = 90 °C (194 °F)"
        );
    }

    #[test]
    fn test_fahrenheit_rounding() {
        assert_eq!(celsius_to_fahrenheit(0), 32);
        assert_eq!(celsius_to_fahrenheit(21), 70); // 69.8
        // -39.5 truncates toward zero
        assert_eq!(celsius_to_fahrenheit(-40), -39);
    }

    #[test]
    fn test_battery_decode() {
        let reading = Signal::BatteryVoltage.decode(&payload(0x00, 0x7D));
        assert_eq!(reading, Reading::Volts(12.5));
        assert_eq!(Signal::BatteryVoltage.report(&reading), "Battery = 12.5 Volts");

        let charge = Signal::BatteryIbs.decode(&payload(0x55, 0x00));
        assert_eq!(charge, Reading::Percent(85));
        assert_eq!(Signal::BatteryIbs.report(&charge), "Battery IBS = 85 %");
    }

    #[test]
    fn test_pressure_decode() {
        // 0x03F5 = 1013 mbar
        let reading = Signal::AtmosphericPressure.decode(&payload(0x03, 0xF5));
        assert_eq!(reading, Reading::Millibar(1013));
        assert_eq!(Signal::BoostPressure.decode(&payload(0x03, 0xF5)), reading);
    }

    #[test]
    fn test_external_temp_decode() {
        // 0x7B = 123, 123/2 = 61, 61 - 40 = 21
        let reading = Signal::ExternalTemp.decode(&payload(0x7B, 0x00));
        assert_eq!(reading, Reading::Celsius(21));
        assert_eq!(Signal::ExternalTemp.decode(&payload(0x00, 0x00)), Reading::Celsius(-40));
    }

    #[test]
    fn test_short_payload_defaults_to_zero() {
        let short = [0x03, 0x62, 0x10, 0x00];
        assert_eq!(Signal::EngineRpm.decode(&short), Reading::Rpm(0));
        assert_eq!(Signal::Gear.decode(&[]), Reading::Gear(Gear::Neutral));
        assert_eq!(Signal::BatteryVoltage.decode(&short[..1]), Reading::Volts(0.0));
    }
}
