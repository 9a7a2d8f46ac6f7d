use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

pub const MIN_TEMPERATURE: f64 = 16.0;
pub const MAX_TEMPERATURE: f64 = 32.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FanSpeed {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr)]
pub enum AcStatus {
    On,
    Off,
}

impl AcStatus {
    /// The status a toggle should request, given the label currently on
    /// screen. Anything other than exactly "On" counts as off.
    pub fn toggled_from_label(label: &str) -> AcStatus {
        if label == AcStatus::On.as_ref() {
            AcStatus::Off
        } else {
            AcStatus::On
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    InvalidTemperature,
    BelowMinimum,
    AboveMaximum,
}

impl Warning {
    pub fn title(&self) -> &'static str {
        match self {
            Warning::InvalidTemperature => "Invalid Temperature",
            Warning::BelowMinimum | Warning::AboveMaximum => "Temperature Adjustment",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Warning::InvalidTemperature => "Current temperature is not valid.",
            Warning::BelowMinimum => "Temperature cannot go below 16°C.",
            Warning::AboveMaximum => "Temperature cannot go above 32°C.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    pub temperature: f64,
    pub warning: Option<Warning>,
}

/// Steps `current` by `delta`, pinning the result to the allowed range.
pub fn adjust_temperature(current: f64, delta: f64) -> Adjustment {
    let temperature = current + delta;
    if temperature < MIN_TEMPERATURE {
        Adjustment {
            temperature: MIN_TEMPERATURE,
            warning: Some(Warning::BelowMinimum),
        }
    } else if temperature > MAX_TEMPERATURE {
        Adjustment {
            temperature: MAX_TEMPERATURE,
            warning: Some(Warning::AboveMaximum),
        }
    } else {
        Adjustment {
            temperature,
            warning: None,
        }
    }
}

pub fn parse_displayed_temperature(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|t| t.is_finite())
}

const SIGNIFICANT_DIGITS: i32 = 6;

fn trim_fraction(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}

/// Shortest form with at most six significant digits, like printf's `%g`,
/// so float noise such as `31.700000000000003` shows as `31.7`.
pub fn format_temperature(temperature: f64) -> String {
    if temperature == 0.0 || !temperature.is_finite() {
        return (temperature + 0.0).to_string();
    }
    let scientific = format!("{:.*e}", (SIGNIFICANT_DIGITS - 1) as usize, temperature);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return scientific,
    };
    if exponent < -4 || exponent >= SIGNIFICANT_DIGITS {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs())
    } else {
        let decimals = (SIGNIFICANT_DIGITS - 1 - exponent) as usize;
        trim_fraction(&format!("{:.*}", decimals, temperature)).to_string()
    }
}

/// One refresh cycle worth of server state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub temperature: f64,
    pub fan_speed: String,
    pub ac_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemperatureReading {
    pub current_temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FanSpeedReading {
    pub fan_speed: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcStatusReading {
    pub ac_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemperatureUpdate {
    pub temperature: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FanSpeedUpdate {
    pub fan_speed: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcToggle {
    pub ac_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateAck {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToggleAck {
    pub status: String,
    pub ac_status: String,
}
