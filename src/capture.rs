use std::time::Duration;

/**
 * Container and text codecs for captured IR recordings.
 *
 * Uses the de facto Broadlink byte layout so captures interchange with
 * SmartIR tooling: transport byte, repeat count, payload length in little
 * endian, then pulse durations in 2^-15 s units (values over one byte are
 * 0x00-escaped and stored as big-endian u16).
 */
use bytes::{Buf, BufMut, Bytes, BytesMut};
use strum::{AsRefStr, EnumString};
use thiserror::Error;

use crate::pwm::PulseSequence;

trait CaptureDuration {
    fn to_units(self) -> u16;
    fn from_units(units: u16) -> Self;
}

impl CaptureDuration for Duration {
    fn to_units(self) -> u16 {
        // Round through float to avoid rounding errors in conversion
        (self.as_micros() as f64 * 269.0 / 8192.0).round() as u16
    }

    fn from_units(units: u16) -> Self {
        Self::from_nanos(((units as f64) * 8192000.0 / 269.0).round() as _)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transport {
    Ir = 0x26,
    Rf433 = 0xb2,
    Rf315 = 0xd7,
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("invalid transport type: {0:#x}")]
    InvalidTransport(u8),

    #[error("capture payload is truncated")]
    Truncated,

    #[error("failed to decode hex string: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("failed to decode base64 string: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("failed to parse raw pulse list")]
    RawParse,

    #[error("empty input")]
    EmptyInput,
}

/// One recorded transmission.
#[derive(Clone, Debug, PartialEq)]
pub struct Capture {
    pub repeat_count: u8,
    pub transport: Transport,
    pub sequence: PulseSequence,
}

impl Capture {
    pub fn new_ir(sequence: PulseSequence) -> Self {
        Self {
            repeat_count: 0,
            transport: Transport::Ir,
            sequence,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut b = BytesMut::new();
        b.put_u8(self.transport as u8);
        b.put_u8(self.repeat_count);

        let mut payload = BytesMut::new();
        for pulse in self.sequence.iter() {
            let units = pulse.to_units();
            if units < 256 {
                payload.put_u8(units as _);
            } else {
                payload.put_u8(0);
                payload.put_u16(units);
            }
        }

        b.put_u16_le(payload.len() as _);
        b.put(payload);
        b.freeze()
    }

    pub fn from_bytes(mut buf: Bytes) -> Result<Self, CaptureError> {
        if buf.len() < 4 {
            return Err(CaptureError::Truncated);
        }

        let transport = match buf.get_u8() {
            0x26 => Transport::Ir,
            0xb2 => Transport::Rf433,
            0xd7 => Transport::Rf315,
            x => return Err(CaptureError::InvalidTransport(x)),
        };

        let repeat_count = buf.get_u8();
        let payload_len = buf.get_u16_le() as usize;
        if buf.len() < payload_len {
            return Err(CaptureError::Truncated);
        }

        let mut pulses = Vec::with_capacity(payload_len);
        let mut remain = payload_len;
        while remain > 0 {
            let mut units = buf.get_u8() as u16;
            remain -= 1;

            if units == 0 {
                // escaped: the value didn't fit one byte and follows as u16
                if remain < 2 {
                    return Err(CaptureError::Truncated);
                }
                units = buf.get_u16();
                remain -= 2;
            }

            pulses.push(Duration::from_units(units));
        }

        Ok(Capture {
            repeat_count,
            transport,
            sequence: PulseSequence::new(pulses),
        })
    }

    /// Signed text form: `+mark -space ...`, microseconds.
    pub fn to_raw(&self) -> String {
        use std::fmt::Write;

        let mut sign = false;
        let mut out = String::new();
        for pulse in self.sequence.iter() {
            sign = !sign;
            write!(out, "{}{} ", if sign { '+' } else { '-' }, pulse.as_micros()).unwrap();
        }
        out
    }

    pub fn from_raw(input: &str) -> Result<Self, CaptureError> {
        // Support IrTransmogrifier's format which looks like `Freq=38400Hz[.....][...]`
        let input = if input.starts_with("Freq=") {
            let untrimmed = input
                .splitn(2, '[')
                .nth(1)
                .ok_or(CaptureError::RawParse)?;
            untrimmed.split(']').next().ok_or(CaptureError::RawParse)?
        } else {
            input
        };

        let msg = irp::Message::parse(input).or(Err(CaptureError::RawParse))?;
        Ok(Capture {
            repeat_count: 0,
            transport: Transport::Ir,
            sequence: msg
                .raw
                .into_iter()
                .map(|t| Duration::from_micros(t as _))
                .collect(),
        })
    }
}

/// Text encodings a capture travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CaptureFormat {
    Base64,
    Hex,
    Raw,
}

impl CaptureFormat {
    pub fn decode(&self, input: &str) -> Result<Capture, CaptureError> {
        match self {
            CaptureFormat::Hex => {
                let mut decoded = hex::decode(input)?;
                if decoded.is_empty() {
                    return Err(CaptureError::EmptyInput);
                }
                if decoded.len() % 2 != 0 {
                    decoded.push(0);
                }
                Capture::from_bytes(Bytes::from(decoded))
            }
            CaptureFormat::Base64 => {
                let decoded = base64::decode(input)?;
                if decoded.is_empty() {
                    return Err(CaptureError::EmptyInput);
                }
                Capture::from_bytes(Bytes::from(decoded))
            }
            CaptureFormat::Raw => Capture::from_raw(input),
        }
    }

    pub fn encode(&self, capture: &Capture) -> Result<String, CaptureError> {
        Ok(match self {
            CaptureFormat::Hex => hex::encode(capture.to_bytes()),
            CaptureFormat::Base64 => base64::encode(capture.to_bytes()),
            CaptureFormat::Raw => capture.to_raw(),
        })
    }
}
