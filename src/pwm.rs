/** A pulse-length codec mapping raw IR durations to logical pulse types */
use std::time::Duration;

use thiserror::Error;

/// Ordered mark/space durations as seen on the IR line, microsecond
/// resolution. Starts with a mark and alternates; immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PulseSequence(Vec<Duration>);

impl PulseSequence {
    pub fn new(pulses: Vec<Duration>) -> Self {
        Self(pulses)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Duration> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[Duration] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Duration> {
        self.0
    }
}

impl FromIterator<Duration> for PulseSequence {
    fn from_iter<I: IntoIterator<Item = Duration>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Matches durations against a nominal value with a percent tolerance.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Rule {
    pub duration: Duration,
    pub tolerance_percent: u32,
}

pub const DEFAULT_TOLERANCE_PERCENT: u32 = 25;

impl Rule {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            tolerance_percent: DEFAULT_TOLERANCE_PERCENT,
        }
    }

    pub fn with_tolerance(duration: Duration, tolerance_percent: u32) -> Self {
        Self {
            duration,
            tolerance_percent,
        }
    }

    fn matches(&self, duration: Duration) -> bool {
        let diff = self
            .duration
            .checked_sub(duration)
            .unwrap_or_else(|| duration.saturating_sub(self.duration));
        diff <= self.duration * self.tolerance_percent / 100
    }
}

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CodecError<T: Copy + std::fmt::Debug> {
    #[error("no rule matches pulse length {0:?}")]
    UnmatchedDuration(Duration),

    #[error("no rule defines pulse type {0:?}")]
    UnknownPulse(T),
}

/// Classifies raw durations into logical pulse types and back. Rules are
/// tried shortest-first, so overlapping tolerance bands resolve
/// deterministically in favor of the shorter nominal duration.
pub struct Codec<T> {
    rules: Vec<(T, Rule)>,
}

impl<T: Copy + Eq + std::fmt::Debug> Codec<T> {
    pub fn new(rules: impl IntoIterator<Item = (T, Rule)>) -> Self {
        let mut rules: Vec<_> = rules.into_iter().collect();
        rules.sort_by_key(|r| r.1.duration);
        Self { rules }
    }

    pub fn classify(&self, duration: Duration) -> Result<T, CodecError<T>> {
        self.rules
            .iter()
            .find(|(_, r)| r.matches(duration))
            .map(|(t, _)| *t)
            .ok_or(CodecError::UnmatchedDuration(duration))
    }

    pub fn duration_of(&self, pulse: T) -> Result<Duration, CodecError<T>> {
        self.rules
            .iter()
            .find(|(t, _)| *t == pulse)
            .map(|(_, r)| r.duration)
            .ok_or(CodecError::UnknownPulse(pulse))
    }
}
