use std::collections::VecDeque;

use log::{debug, warn};
use thiserror::Error;

use crate::pwm::PulseSequence;

/// Hardware modulator abstraction. `emit` hands the sequence to a
/// hardware-timed pulse generator and returns immediately; the hardware
/// reports completion back through `Transmitter::on_complete`.
pub trait PulseEmitter {
    type Error: std::error::Error;

    fn emit(&mut self, sequence: &PulseSequence) -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
pub enum TransmitError<E: std::error::Error> {
    #[error("a transmission is already in flight")]
    HardwareBusy,

    #[error("emitter failure: {0}")]
    Emitter(#[source] E),
}

/// Drives one emitter with strictly exclusive access: at most one sequence in
/// flight, a bounded pending queue behind it, newest state wins. An in-flight
/// waveform is never interrupted; superseding only replaces pending work.
pub struct Transmitter<E: PulseEmitter> {
    emitter: E,
    in_flight: bool,
    pending: VecDeque<PulseSequence>,
    queue_depth: usize,
    superseded: u64,
}

impl<E: PulseEmitter> Transmitter<E> {
    pub fn new(emitter: E) -> Self {
        Self::with_queue_depth(emitter, 1)
    }

    pub fn with_queue_depth(emitter: E, queue_depth: usize) -> Self {
        Self {
            emitter,
            in_flight: false,
            pending: VecDeque::new(),
            queue_depth,
            superseded: 0,
        }
    }

    /// Start a transmission now, or fail if one is already in flight.
    pub fn transmit(&mut self, sequence: PulseSequence) -> Result<(), TransmitError<E::Error>> {
        if self.in_flight {
            return Err(TransmitError::HardwareBusy);
        }
        self.emitter
            .emit(&sequence)
            .map_err(TransmitError::Emitter)?;
        self.in_flight = true;
        Ok(())
    }

    /// Queue-and-replace policy over `transmit`: start immediately when idle,
    /// otherwise hold the sequence behind the in-flight one. Only the latest
    /// desired state matters, so overflow drops the oldest pending entry.
    pub fn enqueue(&mut self, sequence: PulseSequence) -> Result<(), TransmitError<E::Error>> {
        if !self.in_flight {
            return self.transmit(sequence);
        }

        self.pending.push_back(sequence);
        while self.pending.len() > self.queue_depth {
            self.pending.pop_front();
            self.superseded += 1;
            debug!("superseded a pending transmission with a newer state");
        }
        Ok(())
    }

    /// Completion notification from the emitter. Starts the next pending
    /// sequence, if any.
    pub fn on_complete(&mut self) {
        self.in_flight = false;
        if let Some(next) = self.pending.pop_front() {
            if let Err(e) = self.transmit(next) {
                warn!("could not start pending transmission: {}", e);
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.in_flight && self.pending.is_empty()
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn superseded(&self) -> u64 {
        self.superseded
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    pub fn emitter_mut(&mut self) -> &mut E {
        &mut self.emitter
    }
}
