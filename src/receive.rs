use std::time::Duration;

use log::{debug, trace};

use crate::pwm::PulseSequence;

/// Edge intervals shorter than this are treated as electrical glitches and
/// merged back into their neighbors.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_micros(100);

// Anything shorter can't be a frame, not even a repeat.
const MIN_FRAME_PULSES: usize = 3;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverStats {
    pub frames: u64,
    pub noise_dropped: u64,
    pub glitches_merged: u64,
    pub silence_discarded: u64,
}

/// Accumulates raw edge intervals from the demodulator into frame candidates.
/// A silence of at least the frame gap closes the current candidate; framing
/// never fails hard, it just resumes on the next edge.
pub struct Receiver {
    frame_gap: Duration,
    debounce: Duration,
    current: Vec<Duration>,
    pending: Option<Duration>,
    stats: ReceiverStats,
}

impl Receiver {
    pub fn new(frame_gap: Duration) -> Self {
        Self::with_debounce(frame_gap, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(frame_gap: Duration, debounce: Duration) -> Self {
        Self {
            frame_gap,
            debounce,
            current: Vec::new(),
            pending: None,
            stats: ReceiverStats::default(),
        }
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// Feed one interval from the edge callback. Returns a candidate when an
    /// inter-frame silence closes the current accumulation.
    pub fn push_pulse(&mut self, duration: Duration) -> Option<PulseSequence> {
        if duration >= self.frame_gap {
            if self.current.is_empty() && self.pending.is_none() {
                self.stats.silence_discarded += 1;
                trace!("discarding {}us of leading silence", duration.as_micros());
                return None;
            }
            return self.finish();
        }

        // glitches split one pulse into fragments; reassemble them
        match self.pending.take() {
            Some(fragment) if fragment + duration > self.debounce => {
                self.current.push(fragment + duration);
                self.stats.glitches_merged += 1;
            }
            Some(fragment) => self.pending = Some(fragment + duration),
            None if duration > self.debounce => self.current.push(duration),
            None => self.pending = Some(duration),
        }
        None
    }

    /// Force-close the current accumulation, e.g. from an idle timer.
    pub fn finish(&mut self) -> Option<PulseSequence> {
        // a fragment still below the debounce threshold at the end is noise
        self.pending = None;

        let pulses = std::mem::take(&mut self.current);
        if pulses.is_empty() {
            return None;
        }
        if pulses.len() < MIN_FRAME_PULSES {
            self.stats.noise_dropped += 1;
            debug!("dropping {}-pulse candidate as line noise", pulses.len());
            return None;
        }

        self.stats.frames += 1;
        trace!("finished {}-pulse candidate", pulses.len());
        Some(PulseSequence::new(pulses))
    }
}
