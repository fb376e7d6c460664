//! Alarm lifecycle

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::output::{lock_voice, AudioOutput, SharedVoice};
use crate::timers::{AlarmTask, TimerQueue};
use crate::voice::{AlarmVoice, FADE_DURATION, PULSE_PERIOD};
use crate::{AlarmConfig, AlarmError};

/// How long a manual test sounds before silencing itself
pub const TEST_DURATION: Duration = Duration::from_secs(2);

/// Externally visible alarm phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlarmPhase {
    #[default]
    Silent,
    Sounding,
}

/// What started the current alarm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmCause {
    Drowsiness,
    Test,
}

/// Snapshot of the alarm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlarmState {
    pub phase: AlarmPhase,
    /// Amplitude last commanded, 0 when silent or fading
    pub volume: f32,
}

/// Alarm state machine with its own timers.
///
/// Every method takes the current time; due timers run in [`poll`]. Methods
/// that change the phase return the new phase.
///
/// [`poll`]: AlarmController::poll
pub struct AlarmController {
    output: Option<Box<dyn AudioOutput>>,
    audio_error: Option<AlarmError>,
    voice: Option<SharedVoice>,
    phase: AlarmPhase,
    cause: Option<AlarmCause>,
    fading: bool,
    volume: f32,
    suspended: bool,
    timers: TimerQueue,
}

impl AlarmController {
    /// Controller playing through `output`
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self {
            output: Some(output),
            ..Self::visual_only()
        }
    }

    /// Controller without a tone engine; phases still change
    pub fn visual_only() -> Self {
        Self {
            output: None,
            audio_error: None,
            voice: None,
            phase: AlarmPhase::Silent,
            cause: None,
            fading: false,
            volume: 0.0,
            suspended: false,
            timers: TimerQueue::new(),
        }
    }

    pub fn phase(&self) -> AlarmPhase {
        self.phase
    }

    pub fn cause(&self) -> Option<AlarmCause> {
        self.cause
    }

    pub fn state(&self) -> AlarmState {
        AlarmState {
            phase: self.phase,
            volume: self.volume,
        }
    }

    pub fn is_fading(&self) -> bool {
        self.fading
    }

    /// Whether a tone is actually being produced
    pub fn is_audible(&self) -> bool {
        self.voice.is_some()
    }

    /// Set when the tone engine failed and the alarm fell back to visual only
    pub fn audio_error(&self) -> Option<&AlarmError> {
        self.audio_error.as_ref()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Classification is DROWSY. Idempotent while sounding.
    pub fn trigger(&mut self, now: Instant, config: &AlarmConfig) -> Option<AlarmPhase> {
        if self.suspended {
            debug!("Alarm trigger ignored while suspended");
            return None;
        }
        if self.phase == AlarmPhase::Sounding {
            return None;
        }
        info!("Drowsiness alarm triggered");
        self.cause = Some(AlarmCause::Drowsiness);
        self.start_tone(now, config);
        Some(self.phase)
    }

    /// Eyes reopened or face lost. Only ends an alarm the classifier started.
    pub fn auto_stop(&mut self, now: Instant) -> Option<AlarmPhase> {
        if self.cause == Some(AlarmCause::Drowsiness) {
            self.begin_fade(now);
        }
        None
    }

    /// Operator silence
    pub fn silence(&mut self, now: Instant) -> Option<AlarmPhase> {
        if self.phase == AlarmPhase::Sounding {
            info!("Alarm silenced");
            self.begin_fade(now);
        }
        None
    }

    /// Sound for [`TEST_DURATION`], then silence, whatever the classifier says
    pub fn test(&mut self, now: Instant, config: &AlarmConfig) -> Option<AlarmPhase> {
        if self.suspended {
            debug!("Alarm test ignored while suspended");
            return None;
        }
        info!("Alarm test for {:?}", TEST_DURATION);

        let changed = match self.phase {
            AlarmPhase::Silent => {
                self.start_tone(now, config);
                Some(self.phase)
            }
            AlarmPhase::Sounding if self.fading => {
                self.cancel_fade(now, config);
                None
            }
            AlarmPhase::Sounding => None,
        };

        self.cause = Some(AlarmCause::Test);
        self.timers.cancel(AlarmTask::TestExpired);
        self.timers.schedule(now + TEST_DURATION, AlarmTask::TestExpired);
        changed
    }

    /// Stop now, without a fade, and cancel every timer
    pub fn force_silence(&mut self) -> Option<AlarmPhase> {
        self.timers.cancel_all();
        self.release_output();
        self.fading = false;
        self.volume = 0.0;
        self.cause = None;

        if self.phase == AlarmPhase::Sounding {
            info!("Alarm stopped immediately");
            self.phase = AlarmPhase::Silent;
            Some(self.phase)
        } else {
            None
        }
    }

    /// Host visibility. Going to the background silences at once and keeps
    /// the alarm off until visible again.
    pub fn set_visible(&mut self, visible: bool) -> Option<AlarmPhase> {
        if visible {
            if self.suspended {
                debug!("Alarm resumed");
            }
            self.suspended = false;
            None
        } else {
            self.suspended = true;
            self.force_silence()
        }
    }

    /// Run all timers due at `now`
    pub fn poll(&mut self, now: Instant, config: &AlarmConfig) -> Option<AlarmPhase> {
        let before = self.phase;
        while let Some(task) = self.timers.pop_due(now) {
            match task {
                AlarmTask::Pulse => self.pulse(now, config),
                AlarmTask::TestExpired => {
                    debug!("Alarm test expired");
                    self.begin_fade(now);
                }
                AlarmTask::FadeComplete => self.finish_fade(),
            }
        }
        (self.phase != before).then_some(self.phase)
    }

    fn start_tone(&mut self, now: Instant, config: &AlarmConfig) {
        self.phase = AlarmPhase::Sounding;
        self.fading = false;
        self.volume = config.volume;
        self.timers.cancel(AlarmTask::FadeComplete);
        self.timers.cancel(AlarmTask::Pulse);
        self.timers.schedule(now + PULSE_PERIOD, AlarmTask::Pulse);

        let Some(output) = self.output.as_mut() else {
            return;
        };
        if self.voice.is_some() {
            return;
        }

        let mut voice = AlarmVoice::new(output.sample_rate());
        voice.start(config.volume);
        let voice = Arc::new(Mutex::new(voice));
        match output.start(voice.clone()) {
            Ok(()) => self.voice = Some(voice),
            Err(e) => {
                warn!("{}; alarm is visual only", e);
                self.output = None;
                self.audio_error = Some(e);
            }
        }
    }

    fn pulse(&mut self, now: Instant, config: &AlarmConfig) {
        if self.phase != AlarmPhase::Sounding || self.fading {
            return;
        }
        self.volume = config.volume;
        if let Some(voice) = &self.voice {
            lock_voice(voice).pulse(config.volume);
        }
        self.timers.schedule(now + PULSE_PERIOD, AlarmTask::Pulse);
    }

    fn begin_fade(&mut self, now: Instant) {
        if self.phase != AlarmPhase::Sounding || self.fading {
            return;
        }
        debug!("Alarm fading out");
        self.fading = true;
        self.volume = 0.0;
        self.timers.cancel(AlarmTask::Pulse);
        self.timers.cancel(AlarmTask::TestExpired);
        if let Some(voice) = &self.voice {
            lock_voice(voice).fade_out();
        }
        self.timers.schedule(now + FADE_DURATION, AlarmTask::FadeComplete);
    }

    fn cancel_fade(&mut self, now: Instant, config: &AlarmConfig) {
        self.fading = false;
        self.volume = config.volume;
        self.timers.cancel(AlarmTask::FadeComplete);
        if let Some(voice) = &self.voice {
            lock_voice(voice).resume(config.volume);
        }
        self.timers.cancel(AlarmTask::Pulse);
        self.timers.schedule(now + PULSE_PERIOD, AlarmTask::Pulse);
    }

    fn finish_fade(&mut self) {
        self.timers.cancel_all();
        self.release_output();
        self.fading = false;
        self.volume = 0.0;
        self.cause = None;
        self.phase = AlarmPhase::Silent;
        info!("Alarm silent");
    }

    fn release_output(&mut self) {
        if self.voice.take().is_some() {
            if let Some(output) = self.output.as_mut() {
                output.stop();
            }
        }
    }
}

impl Default for AlarmController {
    fn default() -> Self {
        Self::visual_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SynthOutput;

    /// Output that counts calls
    #[derive(Clone, Default)]
    struct CountingOutput {
        counts: Arc<Mutex<(u32, u32)>>,
    }

    impl CountingOutput {
        fn starts(&self) -> u32 {
            self.counts.lock().unwrap().0
        }
        fn stops(&self) -> u32 {
            self.counts.lock().unwrap().1
        }
    }

    impl AudioOutput for CountingOutput {
        fn sample_rate(&self) -> u32 {
            8_000
        }
        fn start(&mut self, _voice: SharedVoice) -> Result<(), AlarmError> {
            self.counts.lock().unwrap().0 += 1;
            Ok(())
        }
        fn stop(&mut self) {
            self.counts.lock().unwrap().1 += 1;
        }
    }

    fn controller() -> (AlarmController, CountingOutput) {
        let output = CountingOutput::default();
        (AlarmController::new(Box::new(output.clone())), output)
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_trigger_is_idempotent() {
        let (mut alarm, output) = controller();
        let config = AlarmConfig::default();
        let t0 = Instant::now();

        assert_eq!(alarm.trigger(t0, &config), Some(AlarmPhase::Sounding));
        assert_eq!(alarm.trigger(t0 + ms(33), &config), None);
        assert_eq!(output.starts(), 1);
        assert_eq!(alarm.state(), AlarmState { phase: AlarmPhase::Sounding, volume: 0.5 });
    }

    #[test]
    fn test_auto_stop_fades_then_silent() {
        let (mut alarm, output) = controller();
        let config = AlarmConfig::default();
        let t0 = Instant::now();

        alarm.trigger(t0, &config);
        assert_eq!(alarm.auto_stop(t0 + ms(100)), None);
        assert!(alarm.is_fading());
        assert_eq!(alarm.phase(), AlarmPhase::Sounding);

        assert_eq!(alarm.poll(t0 + ms(500), &config), None);
        assert_eq!(alarm.poll(t0 + ms(600), &config), Some(AlarmPhase::Silent));
        assert_eq!(output.stops(), 1);
        assert!(!alarm.is_audible());
        assert!(alarm.next_deadline().is_none());
    }

    #[test]
    fn test_stop_requests_while_silent_are_noops() {
        let (mut alarm, output) = controller();
        let t0 = Instant::now();
        alarm.auto_stop(t0);
        alarm.silence(t0);
        assert_eq!(alarm.phase(), AlarmPhase::Silent);
        assert!(alarm.next_deadline().is_none());
        assert_eq!(output.stops(), 0);
    }

    #[test]
    fn test_manual_test_cycle() {
        let (mut alarm, output) = controller();
        let config = AlarmConfig::default();
        let t0 = Instant::now();

        assert_eq!(alarm.test(t0, &config), Some(AlarmPhase::Sounding));
        assert_eq!(alarm.cause(), Some(AlarmCause::Test));

        // An eyes-open frame does not cut the test short
        alarm.auto_stop(t0 + ms(300));
        assert!(!alarm.is_fading());

        assert_eq!(alarm.poll(t0 + ms(1999), &config), None);
        assert_eq!(alarm.poll(t0 + ms(2000), &config), None);
        assert!(alarm.is_fading());
        assert_eq!(alarm.poll(t0 + ms(2500), &config), Some(AlarmPhase::Silent));
        assert_eq!((output.starts(), output.stops()), (1, 1));

        // Classifier-driven behavior is back afterwards
        assert_eq!(alarm.trigger(t0 + ms(2600), &config), Some(AlarmPhase::Sounding));
        assert_eq!(alarm.cause(), Some(AlarmCause::Drowsiness));
    }

    #[test]
    fn test_pulse_rereads_volume() {
        let output = SynthOutput::new(8_000);
        let renderer = output.renderer();
        let mut alarm = AlarmController::new(Box::new(output));
        let t0 = Instant::now();

        alarm.trigger(t0, &AlarmConfig { volume: 0.5 });
        let louder = AlarmConfig { volume: 0.9 };
        alarm.poll(t0 + PULSE_PERIOD, &louder);
        assert_eq!(alarm.state().volume, 0.9);
        assert_eq!(alarm.next_deadline(), Some(t0 + PULSE_PERIOD * 2));

        // Pulse starts at the floor of the new volume
        let mut buf = [0.0f32; 1];
        renderer.render(&mut buf);
        assert!(buf[0].abs() <= 0.9 * 0.3 + 1e-3);
    }

    #[test]
    fn test_silence_cancels_pending_timers() {
        let (mut alarm, _output) = controller();
        let config = AlarmConfig::default();
        let t0 = Instant::now();

        alarm.test(t0, &config);
        alarm.silence(t0 + ms(100));
        alarm.poll(t0 + ms(600), &config);
        assert_eq!(alarm.phase(), AlarmPhase::Silent);

        // The old test expiry and pulses are gone
        assert!(alarm.next_deadline().is_none());
        assert_eq!(alarm.poll(t0 + ms(5000), &config), None);
    }

    #[test]
    fn test_force_silence_mid_fade() {
        let (mut alarm, output) = controller();
        let config = AlarmConfig::default();
        let t0 = Instant::now();

        alarm.trigger(t0, &config);
        alarm.silence(t0 + ms(50));
        assert_eq!(alarm.force_silence(), Some(AlarmPhase::Silent));
        assert_eq!(output.stops(), 1);
        assert!(alarm.next_deadline().is_none());
        assert_eq!(alarm.force_silence(), None);
        assert_eq!(output.stops(), 1);
    }

    #[test]
    fn test_background_suspends() {
        let (mut alarm, _output) = controller();
        let config = AlarmConfig::default();
        let t0 = Instant::now();

        alarm.trigger(t0, &config);
        assert_eq!(alarm.set_visible(false), Some(AlarmPhase::Silent));
        assert_eq!(alarm.trigger(t0 + ms(33), &config), None);
        assert_eq!(alarm.test(t0 + ms(33), &config), None);

        alarm.set_visible(true);
        assert_eq!(alarm.trigger(t0 + ms(66), &config), Some(AlarmPhase::Sounding));
    }

    #[test]
    fn test_unavailable_audio_is_visual_only() {
        let mut alarm = AlarmController::new(Box::new(SynthOutput::unavailable("no device")));
        let config = AlarmConfig::default();
        let t0 = Instant::now();

        assert_eq!(alarm.trigger(t0, &config), Some(AlarmPhase::Sounding));
        assert!(!alarm.is_audible());
        assert!(matches!(alarm.audio_error(), Some(AlarmError::AudioUnavailable(_))));

        alarm.silence(t0);
        assert_eq!(alarm.poll(t0 + FADE_DURATION, &config), Some(AlarmPhase::Silent));
    }

    #[test]
    fn test_test_during_fade_restores_sound() {
        let (mut alarm, output) = controller();
        let config = AlarmConfig::default();
        let t0 = Instant::now();

        alarm.trigger(t0, &config);
        alarm.auto_stop(t0 + ms(100));
        assert_eq!(alarm.test(t0 + ms(200), &config), None);
        assert!(!alarm.is_fading());
        assert_eq!(alarm.poll(t0 + ms(700), &config), None);
        assert_eq!(alarm.phase(), AlarmPhase::Sounding);
        assert_eq!(output.starts(), 1);
    }
}
