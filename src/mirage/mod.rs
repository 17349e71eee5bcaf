pub mod frame;
pub mod phy;
pub use phy::*;

use strum::{AsRefStr, EnumIter, EnumString};

// Temperature range addressable by the remote, Celsius
pub const TEMP_MIN: u8 = 16;
pub const TEMP_MAX: u8 = 32;

// The complete state shown on the remote's display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClimateState {
    // Power state. Turning off keeps the remaining fields as last set, so
    // powering back on restores them.
    pub power: bool,

    pub mode: Mode,

    // Current set temperature in Celsius
    pub temperature: u8,

    // Fan speed setting
    pub fan: FanSpeed,

    // Louver swing setting
    pub swing: SwingMode,
}

impl Default for ClimateState {
    fn default() -> Self {
        Self {
            power: false,
            mode: Mode::Auto,
            temperature: 24,
            fan: FanSpeed::Auto,
            swing: SwingMode::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Mode {
    Auto,
    Cool,
    Dry,
    Heat,
    Fan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FanSpeed {
    Auto,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SwingMode {
    Off,
    Vertical,
    Horizontal,
    Both,
}

/// Per-variant device definition. Variants differ in data, not in code.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub name: String,
    pub min_temperature: u8,
    pub max_temperature: u8,
    pub temperature_step: u8,
    /// Whether power-off is a one-shot command built from the previously
    /// visible settings rather than a regular state field.
    pub one_shot_power_off: bool,
    pub timing: ProtocolTiming,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "mirage".into(),
            min_temperature: TEMP_MIN,
            max_temperature: TEMP_MAX,
            temperature_step: 1,
            one_shot_power_off: true,
            timing: ProtocolTiming::default(),
        }
    }
}

/// Advertised to the host framework at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub min_temperature: u8,
    pub max_temperature: u8,
    pub temperature_step: u8,
    pub modes: Vec<Mode>,
    pub fan_speeds: Vec<FanSpeed>,
    pub swing_modes: Vec<SwingMode>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn mode_names_round_trip() {
        assert_eq!(Mode::from_str("cool").unwrap(), Mode::Cool);
        assert_eq!(Mode::from_str("Heat").unwrap(), Mode::Heat);
        assert_eq!(Mode::Dry.as_ref(), "dry");
        assert!(Mode::from_str("defrost").is_err());
    }

    #[test]
    fn default_state_is_off_and_in_range() {
        let state = ClimateState::default();
        assert!(!state.power);
        assert!((TEMP_MIN..=TEMP_MAX).contains(&state.temperature));
    }
}
