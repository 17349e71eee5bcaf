use thiserror::Error;

use crate::mirage::frame::{Frame, FrameError};
use crate::mirage::{ClimateState, DeviceConfig, FanSpeed, Mode, SwingMode};

/// A partial state change coming from the host framework. Unset fields keep
/// their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateRequest {
    pub power: Option<bool>,
    pub mode: Option<Mode>,
    pub temperature: Option<u8>,
    pub fan: Option<FanSpeed>,
    pub swing: Option<SwingMode>,
}

impl StateRequest {
    pub fn power(on: bool) -> Self {
        Self {
            power: Some(on),
            ..Self::default()
        }
    }

    pub fn mode(mode: Mode) -> Self {
        Self {
            mode: Some(mode),
            ..Self::default()
        }
    }

    pub fn temperature(temp: u8) -> Self {
        Self {
            temperature: Some(temp),
            ..Self::default()
        }
    }
}

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateError {
    #[error("temperature {0} outside supported range {1}..={2}")]
    TemperatureOutOfRange(u8, u8, u8),

    #[error("state can't be framed: {0}")]
    Frame(#[from] FrameError),
}

/// Tracks the last desired state and derives the next command to put on the
/// air. Requests that change nothing produce nothing.
#[derive(Debug)]
pub struct StateModel {
    state: ClimateState,
    min_temperature: u8,
    max_temperature: u8,
    one_shot_power_off: bool,
}

impl StateModel {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            state: ClimateState::default(),
            min_temperature: config.min_temperature,
            max_temperature: config.max_temperature,
            one_shot_power_off: config.one_shot_power_off,
        }
    }

    pub fn state(&self) -> &ClimateState {
        &self.state
    }

    /// Merge a partial request over the current state and return the frame to
    /// transmit, or `None` when the effective state is unchanged. Invalid
    /// requests leave the state untouched and emit nothing.
    pub fn apply(&mut self, request: &StateRequest) -> Result<Option<Frame>, StateError> {
        let mut next = self.state;
        if let Some(power) = request.power {
            next.power = power;
        }
        if let Some(mode) = request.mode {
            next.mode = mode;
        }
        if let Some(temp) = request.temperature {
            if !(self.min_temperature..=self.max_temperature).contains(&temp) {
                return Err(StateError::TemperatureOutOfRange(
                    temp,
                    self.min_temperature,
                    self.max_temperature,
                ));
            }
            next.temperature = temp;
        }
        if let Some(fan) = request.fan {
            next.fan = fan;
        }
        if let Some(swing) = request.swing {
            next.swing = swing;
        }

        if next == self.state {
            return Ok(None);
        }

        // A one-shot off press does not reprogram setpoints: the frame we put
        // on the air carries the settings the device currently shows. The
        // remembered state still takes the rest of the request.
        let frame = if self.state.power && !next.power && self.one_shot_power_off {
            let mut off = self.state;
            off.power = false;
            Frame::try_from(&off)?
        } else {
            Frame::try_from(&next)?
        };

        self.state = next;
        Ok(Some(frame))
    }

    /// Adopt a state seen on the air (e.g. the physical remote was used).
    /// Returns the new state when it differs; never produces a command.
    pub fn observe(&mut self, seen: &ClimateState) -> Option<ClimateState> {
        if *seen == self.state {
            return None;
        }
        self.state = *seen;
        Some(self.state)
    }
}
