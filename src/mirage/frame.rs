use std::fmt;

use bitfield::bitfield;
use thiserror::Error;

use super::{ClimateState, FanSpeed, Mode, SwingMode, TEMP_MAX, TEMP_MIN};

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("temperature {0} out of range, must be between 16C and 32C")]
    TemperatureOutOfRange(u8),

    #[error("mode value wasn't recognized: {0:#x}")]
    ModeOutOfRange(u8),

    #[error("unexpected fixed values in frame")]
    UnexpectedFixedValues,

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("frame length {0} != 14")]
    Length(usize),
}

pub const FRAME_LEN: usize = 14;

bitfield! {
    struct ModeFanByte(u8);
    impl Debug;
    u8, mode_raw, set_mode_raw: 6, 4;
    u8, fan_raw, set_fan_raw: 1, 0;
}

bitfield! {
    struct PowerSwingByte(u8);
    impl Debug;
    u8, power_raw, set_power_raw: 7, 6;
    u8, swing_raw, set_swing_raw: 1, 0;
}

/// The 14-byte command image sent over the air, least significant bit first
/// per byte. Immutable once built from a state.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_LEN]);

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame(")?;
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02X}", b)?;
        }
        write!(f, ")")
    }
}

impl Frame {
    const HEADER: u8 = 0x56;
    const TEMP_OFFSET: u8 = 0x5C;

    // Modes, bits 6..4 of byte 4
    const MODE_HEAT: u8 = 0b001;
    const MODE_COOL: u8 = 0b010;
    const MODE_DRY: u8 = 0b011;
    const MODE_AUTO: u8 = 0b100;
    const MODE_FAN: u8 = 0b101;

    // Fan speeds, bits 1..0 of byte 4
    const FAN_AUTO: u8 = 0b00;
    const FAN_HIGH: u8 = 0b01;
    const FAN_LOW: u8 = 0b10;
    const FAN_MEDIUM: u8 = 0b11;

    // Swing, bits 1..0 of byte 5
    const SWING_OFF: u8 = 0b00;
    const SWING_HORIZONTAL: u8 = 0b01;
    const SWING_VERTICAL: u8 = 0b10;
    const SWING_BOTH: u8 = 0b11;

    // Power-off marker, bits 7..6 of byte 5
    const POWER_OFF: u8 = 0b11;

    pub fn new() -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[0] = Frame::HEADER;
        bytes[1] = Frame::TEMP_OFFSET;
        Frame(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        let bytes: [u8; FRAME_LEN] = bytes
            .try_into()
            .map_err(|_| FrameError::Length(bytes.len()))?;
        Ok(Frame(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    pub fn temperature(&self) -> Result<u8, FrameError> {
        let temp = self.0[1].wrapping_sub(Frame::TEMP_OFFSET);
        if !(TEMP_MIN..=TEMP_MAX).contains(&temp) {
            return Err(FrameError::TemperatureOutOfRange(temp));
        }
        Ok(temp)
    }

    pub fn set_temperature(&mut self, temp: u8) -> Result<(), FrameError> {
        if !(TEMP_MIN..=TEMP_MAX).contains(&temp) {
            return Err(FrameError::TemperatureOutOfRange(temp));
        }
        self.0[1] = Frame::TEMP_OFFSET + temp;
        Ok(())
    }

    pub fn mode(&self) -> Result<Mode, FrameError> {
        let raw = ModeFanByte(self.0[4]).mode_raw();
        Ok(match raw {
            Frame::MODE_HEAT => Mode::Heat,
            Frame::MODE_COOL => Mode::Cool,
            Frame::MODE_DRY => Mode::Dry,
            Frame::MODE_AUTO => Mode::Auto,
            Frame::MODE_FAN => Mode::Fan,
            _ => return Err(FrameError::ModeOutOfRange(raw)),
        })
    }

    pub fn set_mode(&mut self, mode: Mode) {
        let mut b = ModeFanByte(self.0[4]);
        b.set_mode_raw(match mode {
            Mode::Heat => Frame::MODE_HEAT,
            Mode::Cool => Frame::MODE_COOL,
            Mode::Dry => Frame::MODE_DRY,
            Mode::Auto => Frame::MODE_AUTO,
            Mode::Fan => Frame::MODE_FAN,
        });
        self.0[4] = b.0;
    }

    pub fn fan(&self) -> FanSpeed {
        match ModeFanByte(self.0[4]).fan_raw() {
            Frame::FAN_HIGH => FanSpeed::High,
            Frame::FAN_LOW => FanSpeed::Low,
            Frame::FAN_MEDIUM => FanSpeed::Medium,
            _ => FanSpeed::Auto,
        }
    }

    pub fn set_fan(&mut self, fan: FanSpeed) {
        let mut b = ModeFanByte(self.0[4]);
        b.set_fan_raw(match fan {
            FanSpeed::Auto => Frame::FAN_AUTO,
            FanSpeed::High => Frame::FAN_HIGH,
            FanSpeed::Low => Frame::FAN_LOW,
            FanSpeed::Medium => Frame::FAN_MEDIUM,
        });
        self.0[4] = b.0;
    }

    pub fn swing(&self) -> SwingMode {
        match PowerSwingByte(self.0[5]).swing_raw() {
            Frame::SWING_HORIZONTAL => SwingMode::Horizontal,
            Frame::SWING_VERTICAL => SwingMode::Vertical,
            Frame::SWING_BOTH => SwingMode::Both,
            _ => SwingMode::Off,
        }
    }

    pub fn set_swing(&mut self, swing: SwingMode) {
        let mut b = PowerSwingByte(self.0[5]);
        b.set_swing_raw(match swing {
            SwingMode::Off => Frame::SWING_OFF,
            SwingMode::Horizontal => Frame::SWING_HORIZONTAL,
            SwingMode::Vertical => Frame::SWING_VERTICAL,
            SwingMode::Both => Frame::SWING_BOTH,
        });
        self.0[5] = b.0;
    }

    pub fn power(&self) -> bool {
        PowerSwingByte(self.0[5]).power_raw() != Frame::POWER_OFF
    }

    pub fn set_power(&mut self, on: bool) {
        let mut b = PowerSwingByte(self.0[5]);
        b.set_power_raw(if on { 0 } else { Frame::POWER_OFF });
        self.0[5] = b.0;
    }

    fn compute_checksum(&self) -> u8 {
        let mut sum: u8 = 0;
        for &b in &self.0[..FRAME_LEN - 1] {
            sum = sum.wrapping_add(b);
        }
        sum.wrapping_neg()
    }

    fn apply_checksum(&mut self) {
        self.0[FRAME_LEN - 1] = self.compute_checksum();
    }

    pub fn checksum(&self) -> u8 {
        self.0[FRAME_LEN - 1]
    }

    /// Fixed-byte and checksum validation, without decoding any field.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.0[0] != Frame::HEADER
            || self.0[2] != 0
            || self.0[3] != 0
            || self.0[6..FRAME_LEN - 1].iter().any(|&b| b != 0)
        {
            return Err(FrameError::UnexpectedFixedValues);
        }
        if self.compute_checksum() != self.checksum() {
            return Err(FrameError::ChecksumMismatch);
        }
        Ok(())
    }
}

impl TryFrom<&ClimateState> for Frame {
    type Error = FrameError;

    fn try_from(state: &ClimateState) -> Result<Self, FrameError> {
        let mut frame = Frame::new();
        frame.set_temperature(state.temperature)?;
        frame.set_mode(state.mode);
        frame.set_fan(state.fan);
        frame.set_swing(state.swing);
        frame.set_power(state.power);
        frame.apply_checksum();
        Ok(frame)
    }
}

impl TryFrom<&Frame> for ClimateState {
    type Error = FrameError;

    fn try_from(frame: &Frame) -> Result<Self, FrameError> {
        frame.validate()?;

        Ok(ClimateState {
            power: frame.power(),
            mode: frame.mode()?,
            temperature: frame.temperature()?,
            fan: frame.fan(),
            swing: frame.swing(),
        })
    }
}
