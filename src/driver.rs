use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};
use strum::IntoEnumIterator;
use thiserror::Error;

use crate::mirage::{
    Capabilities, ClimateState, Decoded, DecodeErrorKind, DeviceConfig, FanSpeed, Mode, Phy,
    SwingMode,
};
use crate::pwm::PulseSequence;
use crate::receive::Receiver;
use crate::state::{StateError, StateModel, StateRequest};
use crate::transmit::{PulseEmitter, TransmitError, Transmitter};

/// Frames seen on the line this soon after our own transmission are our own
/// signal bouncing back into the receiver.
const ECHO_BLANK: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum DriverError<E: std::error::Error> {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Transmit(#[from] TransmitError<E>),
}

/// Reception failure accounting. Decode failures are line noise, not faults;
/// they are counted here and never surfaced to the host.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStats {
    pub malformed: u64,
    pub checksum_mismatch: u64,
    pub truncated: u64,
}

impl DecodeStats {
    fn record(&mut self, kind: DecodeErrorKind) {
        match kind {
            DecodeErrorKind::Malformed => self.malformed += 1,
            DecodeErrorKind::ChecksumMismatch => self.checksum_mismatch += 1,
            DecodeErrorKind::Truncated => self.truncated += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.malformed + self.checksum_mismatch + self.truncated
    }
}

type StateCallback = Box<dyn FnMut(&ClimateState)>;

/// One driver instance owns one hardware line. All dependencies come in
/// through the constructor; completion and edge notifications are fed back in
/// by the hardware layer.
pub struct Driver<E: PulseEmitter> {
    config: DeviceConfig,
    phy: Phy,
    model: StateModel,
    transmitter: Transmitter<E>,
    receiver: Receiver,
    on_state_changed: Option<StateCallback>,
    last_transmit: Option<Instant>,
    decode_stats: DecodeStats,
}

impl<E: PulseEmitter> Driver<E> {
    pub fn new(config: DeviceConfig, emitter: E) -> Self {
        let phy = Phy::with_timing(config.timing);
        let receiver = Receiver::new(config.timing.frame_gap);
        let model = StateModel::new(&config);
        Self {
            config,
            phy,
            model,
            transmitter: Transmitter::new(emitter),
            receiver,
            on_state_changed: None,
            last_transmit: None,
            decode_stats: DecodeStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn state(&self) -> &ClimateState {
        self.model.state()
    }

    pub fn decode_stats(&self) -> DecodeStats {
        self.decode_stats
    }

    pub fn transmitter(&self) -> &Transmitter<E> {
        &self.transmitter
    }

    /// What to advertise to the host framework at registration time.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            min_temperature: self.config.min_temperature,
            max_temperature: self.config.max_temperature,
            temperature_step: self.config.temperature_step,
            modes: Mode::iter().collect(),
            fan_speeds: FanSpeed::iter().collect(),
            swing_modes: SwingMode::iter().collect(),
        }
    }

    pub fn on_state_changed(&mut self, callback: impl FnMut(&ClimateState) + 'static) {
        self.on_state_changed = Some(Box::new(callback));
    }

    /// Apply a host request; schedule a transmission when the effective state
    /// changed. Returns whether anything was put on the air.
    pub fn set_state(&mut self, request: &StateRequest) -> Result<bool, DriverError<E::Error>> {
        let Some(frame) = self.model.apply(request)? else {
            trace!("request changes nothing, not transmitting");
            return Ok(false);
        };

        debug!("transmitting {:?}", frame);
        let sequence = self.phy.encode(&frame);
        self.last_transmit = Some(Instant::now());
        self.transmitter.enqueue(sequence)?;
        self.notify();
        Ok(true)
    }

    /// Completion notification from the pulse emitter.
    pub fn on_transmit_complete(&mut self) {
        self.transmitter.on_complete();
    }

    /// Edge interval from the receiver hardware callback.
    pub fn on_pulse(&mut self, duration: Duration) {
        if let Some(candidate) = self.receiver.push_pulse(duration) {
            self.handle_candidate(candidate);
        }
    }

    /// Idle notification from the receiver's silence timer.
    pub fn on_receive_timeout(&mut self) {
        if let Some(candidate) = self.receiver.finish() {
            self.handle_candidate(candidate);
        }
    }

    fn handle_candidate(&mut self, candidate: PulseSequence) {
        if let Some(at) = self.last_transmit {
            if at.elapsed() < ECHO_BLANK {
                debug!("ignoring a candidate heard during our own transmission");
                return;
            }
        }

        match self.phy.decode(&candidate) {
            Ok(Decoded::Repeat) => {
                trace!("repeat frame affirms the previous command");
            }
            Ok(Decoded::Frame(frame)) => match ClimateState::try_from(&frame) {
                Ok(seen) => {
                    if let Some(adopted) = self.model.observe(&seen) {
                        info!("adopting state seen on the air: {:?}", adopted);
                        self.notify();
                    }
                }
                Err(e) => {
                    self.decode_stats.record(DecodeErrorKind::Malformed);
                    warn!("frame with undecodable fields: {}", e);
                }
            },
            Err(e) => {
                self.decode_stats.record(e.kind());
                debug!("dropping candidate: {}", e);
            }
        }
    }

    fn notify(&mut self) {
        let state = *self.model.state();
        if let Some(callback) = self.on_state_changed.as_mut() {
            callback(&state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirage::frame::Frame;
    use std::cell::RefCell;
    use std::rc::Rc;
    use thiserror::Error;

    #[derive(Error, Debug)]
    #[error("emitter is broken")]
    struct MockError;

    #[derive(Default)]
    struct MockEmitter {
        emitted: Vec<PulseSequence>,
    }

    impl PulseEmitter for MockEmitter {
        type Error = MockError;

        fn emit(&mut self, sequence: &PulseSequence) -> Result<(), MockError> {
            self.emitted.push(sequence.clone());
            Ok(())
        }
    }

    fn driver() -> Driver<MockEmitter> {
        Driver::new(DeviceConfig::default(), MockEmitter::default())
    }

    fn cool_22() -> StateRequest {
        StateRequest {
            power: Some(true),
            mode: Some(Mode::Cool),
            temperature: Some(22),
            fan: Some(FanSpeed::Auto),
            swing: None,
        }
    }

    fn emitted(driver: &Driver<MockEmitter>) -> &[PulseSequence] {
        &driver.transmitter().emitter().emitted
    }

    fn decode_state(driver: &Driver<MockEmitter>, sequence: &PulseSequence) -> ClimateState {
        match driver.phy.decode(sequence).unwrap() {
            Decoded::Frame(frame) => ClimateState::try_from(&frame).unwrap(),
            Decoded::Repeat => panic!("unexpected repeat"),
        }
    }

    #[test]
    fn test_cool_22_scenario() {
        let mut driver = driver();
        assert!(driver.set_state(&cool_22()).unwrap());

        let sequences = emitted(&driver).to_vec();
        assert_eq!(sequences.len(), 1);
        assert!(!sequences[0].is_empty());

        let sent = decode_state(&driver, &sequences[0]);
        assert!(sent.power);
        assert_eq!(sent.mode, Mode::Cool);
        assert_eq!(sent.temperature, 22);
        assert_eq!(sent.fan, FanSpeed::Auto);

        // the identical request is a no-op
        assert!(!driver.set_state(&cool_22()).unwrap());
        assert_eq!(emitted(&driver).len(), 1);
    }

    #[test]
    fn test_newest_request_wins_on_busy_line() {
        let mut driver = driver();
        driver.set_state(&cool_22()).unwrap();

        // two more requests land while the first waveform is in flight
        driver.set_state(&StateRequest::mode(Mode::Heat)).unwrap();
        driver.set_state(&StateRequest::mode(Mode::Dry)).unwrap();
        assert_eq!(emitted(&driver).len(), 1);

        driver.on_transmit_complete();
        let sequences = emitted(&driver).to_vec();
        assert_eq!(sequences.len(), 2);
        assert_eq!(decode_state(&driver, &sequences[1]).mode, Mode::Dry);

        driver.on_transmit_complete();
        assert!(driver.transmitter().is_idle());
        assert_eq!(driver.transmitter().superseded(), 1);
    }

    #[test]
    fn test_repeat_frame_changes_nothing() {
        let mut driver = driver();
        let before = *driver.state();
        let repeat = driver.phy.encode_repeat().unwrap();

        for pulse in repeat.iter() {
            driver.on_pulse(pulse);
        }
        driver.on_pulse(Duration::from_millis(50));

        assert_eq!(*driver.state(), before);
        assert!(emitted(&driver).is_empty());
        assert_eq!(driver.decode_stats().total(), 0);
    }

    #[test]
    fn test_adopts_state_from_the_air() {
        let mut driver = driver();
        let observed = Rc::new(RefCell::new(Vec::new()));
        {
            let observed = observed.clone();
            driver.on_state_changed(move |state| observed.borrow_mut().push(*state));
        }

        let seen = ClimateState {
            power: true,
            mode: Mode::Heat,
            temperature: 26,
            fan: FanSpeed::High,
            swing: SwingMode::Off,
        };
        let sequence = driver.phy.encode(&Frame::try_from(&seen).unwrap());
        for pulse in sequence.iter() {
            driver.on_pulse(pulse);
        }
        driver.on_receive_timeout();

        assert_eq!(*driver.state(), seen);
        assert_eq!(*observed.borrow(), vec![seen]);
        // nothing goes back out in response
        assert!(emitted(&driver).is_empty());
    }

    #[test]
    fn test_noise_is_counted_not_surfaced() {
        let mut driver = driver();
        for pulse in [8360, 4248, 554, 9000, 554] {
            driver.on_pulse(Duration::from_micros(pulse));
        }
        driver.on_receive_timeout();

        assert_eq!(driver.decode_stats().malformed, 1);
        assert_eq!(*driver.state(), ClimateState::default());
    }

    #[test]
    fn test_own_echo_is_blanked() {
        let mut driver = driver();
        driver.set_state(&cool_22()).unwrap();

        let echo = emitted(&driver)[0].clone();
        for pulse in echo.iter() {
            driver.on_pulse(pulse);
        }
        driver.on_receive_timeout();

        // the candidate right after our transmission is ignored entirely
        assert_eq!(driver.decode_stats().total(), 0);
        assert_eq!(emitted(&driver).len(), 1);
    }

    #[test]
    fn test_callback_fires_on_host_change() {
        let mut driver = driver();
        let observed = Rc::new(RefCell::new(Vec::new()));
        {
            let observed = observed.clone();
            driver.on_state_changed(move |state| observed.borrow_mut().push(*state));
        }

        driver.set_state(&cool_22()).unwrap();
        assert_eq!(observed.borrow().len(), 1);
        assert_eq!(observed.borrow()[0].mode, Mode::Cool);
    }

    #[test]
    fn test_capabilities() {
        let driver = driver();
        let caps = driver.capabilities();
        assert_eq!(caps.min_temperature, 16);
        assert_eq!(caps.max_temperature, 32);
        assert_eq!(caps.temperature_step, 1);
        assert_eq!(caps.modes.len(), 5);
        assert_eq!(caps.fan_speeds.len(), 4);
        assert_eq!(caps.swing_modes.len(), 4);
    }
}
