use std::time::Duration;

use thiserror::Error;

use super::frame::{Frame, FrameError, FRAME_LEN};
use crate::pwm::{Codec, CodecError, PulseSequence, Rule, DEFAULT_TOLERANCE_PERCENT};

/// Timing table for one protocol variant. Read-only after construction;
/// defaults describe the Mirage remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolTiming {
    pub header_mark: Duration,
    pub header_space: Duration,
    pub bit_mark: Duration,
    pub one_space: Duration,
    pub zero_space: Duration,
    /// Space of the short "repeat last command" frame, when the protocol
    /// family has one.
    pub repeat_space: Option<Duration>,
    /// Silence threshold separating frames on the line.
    pub frame_gap: Duration,
    pub tolerance_percent: u32,
}

impl Default for ProtocolTiming {
    fn default() -> Self {
        Self {
            header_mark: Duration::from_micros(8360),
            header_space: Duration::from_micros(4248),
            bit_mark: Duration::from_micros(554),
            one_space: Duration::from_micros(1592),
            zero_space: Duration::from_micros(545),
            repeat_space: Some(Duration::from_micros(2124)),
            frame_gap: Duration::from_millis(10),
            tolerance_percent: DEFAULT_TOLERANCE_PERCENT,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
enum Mark {
    Header,
    Bit,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
enum Space {
    Header,
    One,
    Zero,
    Repeat,
}

/// Result of decoding one pulse sequence: either a full command frame or the
/// protocol's "repeat the previous command" sentinel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoded {
    Frame(Frame),
    Repeat,
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty pulse sequence")]
    Empty,

    #[error("unrecognized pulse length {0:?}")]
    UnknownPulse(Duration),

    #[error("invalid preamble")]
    InvalidPreamble,

    #[error("unexpected pulse pair in payload")]
    InvalidBitCell,

    #[error("frame ended after {0} bits, expected {1}")]
    Truncated(usize, usize),

    #[error("pulses continue past the end of the frame")]
    Overrun,

    #[error("unexpected fixed values in frame")]
    FixedValues,

    #[error("checksum mismatch")]
    ChecksumMismatch,
}

/// Coarse failure taxonomy used for accounting at the reception boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    Malformed,
    ChecksumMismatch,
    Truncated,
}

impl DecodeError {
    pub fn kind(&self) -> DecodeErrorKind {
        match self {
            DecodeError::Empty | DecodeError::Truncated(_, _) => DecodeErrorKind::Truncated,
            DecodeError::ChecksumMismatch => DecodeErrorKind::ChecksumMismatch,
            _ => DecodeErrorKind::Malformed,
        }
    }
}

impl From<FrameError> for DecodeError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::ChecksumMismatch => DecodeError::ChecksumMismatch,
            _ => DecodeError::FixedValues,
        }
    }
}

fn unknown_pulse<T: Copy + std::fmt::Debug>(e: CodecError<T>) -> DecodeError {
    match e {
        CodecError::UnmatchedDuration(d) => DecodeError::UnknownPulse(d),
        CodecError::UnknownPulse(_) => DecodeError::InvalidBitCell,
    }
}

pub struct Phy {
    timing: ProtocolTiming,
    marks: Codec<Mark>,
    spaces: Codec<Space>,
}

impl Phy {
    pub fn new() -> Self {
        Self::with_timing(ProtocolTiming::default())
    }

    /// Marks and spaces get separate rule sets: the bit mark and the zero
    /// space are too close together to tell apart by duration alone.
    pub fn with_timing(timing: ProtocolTiming) -> Self {
        let tol = timing.tolerance_percent;
        let marks = Codec::new([
            (Mark::Bit, Rule::with_tolerance(timing.bit_mark, tol)),
            (Mark::Header, Rule::with_tolerance(timing.header_mark, tol)),
        ]);

        let mut space_rules = vec![
            (Space::Zero, Rule::with_tolerance(timing.zero_space, tol)),
            (Space::One, Rule::with_tolerance(timing.one_space, tol)),
            (Space::Header, Rule::with_tolerance(timing.header_space, tol)),
        ];
        if let Some(repeat) = timing.repeat_space {
            space_rules.push((Space::Repeat, Rule::with_tolerance(repeat, tol)));
        }

        Self {
            timing,
            marks,
            spaces: Codec::new(space_rules),
        }
    }

    pub fn timing(&self) -> &ProtocolTiming {
        &self.timing
    }

    /// Expand a frame to its wire form: header pair, one cell per bit
    /// (LSB-first within each byte), trailing mark.
    pub fn encode(&self, frame: &Frame) -> PulseSequence {
        let t = &self.timing;
        let mut pulses = Vec::with_capacity(2 * (FRAME_LEN * 8 + 1) + 1);

        pulses.push(t.header_mark);
        pulses.push(t.header_space);

        for &byte in frame.as_bytes() {
            for bit in 0..8 {
                pulses.push(t.bit_mark);
                pulses.push(if byte & (1 << bit) != 0 {
                    t.one_space
                } else {
                    t.zero_space
                });
            }
        }

        pulses.push(t.bit_mark);
        PulseSequence::new(pulses)
    }

    /// The short fixed frame meaning "repeat the previous command", when the
    /// timing table defines one.
    pub fn encode_repeat(&self) -> Option<PulseSequence> {
        let repeat = self.timing.repeat_space?;
        Some(PulseSequence::new(vec![
            self.timing.header_mark,
            repeat,
            self.timing.bit_mark,
        ]))
    }

    pub fn decode(&self, sequence: &PulseSequence) -> Result<Decoded, DecodeError> {
        let cells = self.classify(sequence)?;
        let mut cells = cells.into_iter();

        match cells.next().ok_or(DecodeError::Empty)? {
            (Mark::Header, Some(Space::Header)) => {}
            (Mark::Header, Some(Space::Repeat)) => {
                return match (cells.next(), cells.next()) {
                    (Some((Mark::Bit, None)), None) => Ok(Decoded::Repeat),
                    _ => Err(DecodeError::InvalidPreamble),
                };
            }
            _ => return Err(DecodeError::InvalidPreamble),
        }

        let expected = FRAME_LEN * 8;
        let mut bytes = [0u8; FRAME_LEN];
        let mut bit = 0usize;
        let mut terminated = false;

        for cell in cells {
            if terminated {
                return Err(DecodeError::Overrun);
            }
            match cell {
                (Mark::Bit, Some(space @ (Space::Zero | Space::One))) => {
                    if bit >= expected {
                        return Err(DecodeError::Overrun);
                    }
                    if space == Space::One {
                        bytes[bit / 8] |= 1 << (bit % 8);
                    }
                    bit += 1;
                }
                // trailing mark ends the frame
                (Mark::Bit, None) => terminated = true,
                _ => return Err(DecodeError::InvalidBitCell),
            }
        }

        if bit != expected {
            return Err(DecodeError::Truncated(bit, expected));
        }

        let frame = Frame::from_bytes(&bytes)?;
        frame.validate()?;
        Ok(Decoded::Frame(frame))
    }

    /// Pair raw durations into (mark, space) cells. The final mark may be
    /// unpaired, or paired with the inter-frame silence.
    fn classify(
        &self,
        sequence: &PulseSequence,
    ) -> Result<Vec<(Mark, Option<Space>)>, DecodeError> {
        let pulses = sequence.as_slice();
        if pulses.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mut cells = Vec::with_capacity(pulses.len() / 2 + 1);
        let mut i = 0;
        while i < pulses.len() {
            let mark = self.marks.classify(pulses[i]).map_err(unknown_pulse)?;
            let space = match pulses.get(i + 1) {
                None => None,
                Some(&s) if s >= self.timing.frame_gap => {
                    if i + 2 < pulses.len() {
                        // silence in the middle of a candidate means the
                        // receiver misframed it
                        return Err(DecodeError::InvalidBitCell);
                    }
                    None
                }
                Some(&s) => Some(self.spaces.classify(s).map_err(unknown_pulse)?),
            };
            cells.push((mark, space));
            i += 2;
        }
        Ok(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirage::{ClimateState, FanSpeed, Mode, SwingMode};

    fn state(mode: Mode, temperature: u8, fan: FanSpeed, swing: SwingMode) -> ClimateState {
        ClimateState {
            power: true,
            mode,
            temperature,
            fan,
            swing,
        }
    }

    fn scale(sequence: &PulseSequence, numerator: u32, denominator: u32) -> PulseSequence {
        sequence
            .iter()
            .map(|d| d * numerator / denominator)
            .collect()
    }

    #[test]
    fn test_round_trip() {
        let phy = Phy::new();
        let states = [
            state(Mode::Cool, 22, FanSpeed::Auto, SwingMode::Off),
            state(Mode::Heat, 16, FanSpeed::High, SwingMode::Both),
            state(Mode::Dry, 32, FanSpeed::Low, SwingMode::Vertical),
            state(Mode::Fan, 28, FanSpeed::Medium, SwingMode::Horizontal),
            ClimateState {
                power: false,
                ..state(Mode::Auto, 24, FanSpeed::Auto, SwingMode::Off)
            },
        ];

        for s in states {
            let frame = Frame::try_from(&s).unwrap();
            let pulses = phy.encode(&frame);
            assert_eq!(pulses.len(), 2 + FRAME_LEN * 8 * 2 + 1);
            match phy.decode(&pulses).unwrap() {
                Decoded::Frame(decoded) => {
                    assert_eq!(decoded.as_bytes(), frame.as_bytes());
                    assert_eq!(ClimateState::try_from(&decoded).unwrap(), s);
                }
                Decoded::Repeat => panic!("unexpected repeat"),
            }
        }
    }

    #[test]
    fn test_jitter_tolerance() {
        let phy = Phy::new();
        let frame = Frame::try_from(&state(Mode::Cool, 22, FanSpeed::Auto, SwingMode::Off)).unwrap();
        let pulses = phy.encode(&frame);

        // 20% off in either direction stays within the 25% tolerance
        for perturbed in [scale(&pulses, 6, 5), scale(&pulses, 4, 5)] {
            match phy.decode(&perturbed).unwrap() {
                Decoded::Frame(decoded) => assert_eq!(decoded.as_bytes(), frame.as_bytes()),
                Decoded::Repeat => panic!("unexpected repeat"),
            }
        }

        // 35% off does not
        for perturbed in [scale(&pulses, 27, 20), scale(&pulses, 13, 20)] {
            let err = phy.decode(&perturbed).unwrap_err();
            assert_eq!(err.kind(), DecodeErrorKind::Malformed);
        }
    }

    #[test]
    fn test_truncated() {
        let phy = Phy::new();
        let frame = Frame::try_from(&state(Mode::Heat, 20, FanSpeed::Low, SwingMode::Off)).unwrap();
        let pulses = phy.encode(&frame);

        for cut in [51, 50] {
            let truncated: PulseSequence = pulses.iter().take(cut).collect();
            let err = phy.decode(&truncated).unwrap_err();
            assert_eq!(err.kind(), DecodeErrorKind::Truncated);
        }
    }

    #[test]
    fn test_checksum_mismatch() {
        let phy = Phy::new();
        let frame = Frame::try_from(&state(Mode::Cool, 22, FanSpeed::Auto, SwingMode::Off)).unwrap();
        let mut bytes = *frame.as_bytes();
        bytes[13] ^= 0x40;
        let corrupted = Frame::from_bytes(&bytes).unwrap();

        let err = phy.decode(&phy.encode(&corrupted)).unwrap_err();
        assert_eq!(err, DecodeError::ChecksumMismatch);
        assert_eq!(err.kind(), DecodeErrorKind::ChecksumMismatch);
    }

    #[test]
    fn test_repeat_frame() {
        let phy = Phy::new();
        let repeat = phy.encode_repeat().unwrap();
        assert_eq!(phy.decode(&repeat).unwrap(), Decoded::Repeat);

        let without_repeat = Phy::with_timing(ProtocolTiming {
            repeat_space: None,
            ..ProtocolTiming::default()
        });
        assert!(without_repeat.encode_repeat().is_none());
        assert!(without_repeat.decode(&repeat).is_err());
    }

    #[test]
    fn test_trailing_gap_tolerated() {
        let phy = Phy::new();
        let frame = Frame::try_from(&state(Mode::Auto, 26, FanSpeed::Auto, SwingMode::Off)).unwrap();
        let mut pulses = phy.encode(&frame).into_inner();
        pulses.push(Duration::from_millis(100));

        match phy.decode(&PulseSequence::new(pulses)).unwrap() {
            Decoded::Frame(decoded) => assert_eq!(decoded.as_bytes(), frame.as_bytes()),
            Decoded::Repeat => panic!("unexpected repeat"),
        }
    }

    #[test]
    fn test_noise_is_malformed() {
        let phy = Phy::new();
        let noise = PulseSequence::new(vec![
            Duration::from_micros(8360),
            Duration::from_micros(4248),
            Duration::from_micros(554),
            Duration::from_micros(9000),
            Duration::from_micros(554),
        ]);
        let err = phy.decode(&noise).unwrap_err();
        assert_eq!(err.kind(), DecodeErrorKind::Malformed);
    }
}
