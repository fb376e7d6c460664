//! Alarm tone synthesis

use std::time::Duration;

use crate::envelope::{Curve, Envelope};

/// Sweep start frequency (Hz)
pub const SWEEP_START_HZ: f32 = 800.0;
/// Sweep end frequency (Hz)
pub const SWEEP_END_HZ: f32 = 1200.0;
/// Time to reach the end frequency
pub const SWEEP_DURATION: Duration = Duration::from_millis(500);
/// Gain attack when the tone starts
pub const ATTACK_DURATION: Duration = Duration::from_millis(100);
/// Amplitude pulse period
pub const PULSE_PERIOD: Duration = Duration::from_secs(1);
/// Pulse dips to this fraction of the volume, then ramps back
pub const PULSE_FLOOR: f32 = 0.3;
/// Ramp back to full volume after a dip
pub const PULSE_RAMP: Duration = Duration::from_millis(500);
/// Fade-out before the tone stops
pub const FADE_DURATION: Duration = Duration::from_millis(500);
/// Level considered silent at the end of a fade
pub const FADE_FLOOR: f32 = 0.001;

/// Sawtooth voice with frequency and gain automation.
///
/// Envelopes advance with rendered samples, so the shaping follows the
/// audio clock rather than the control timeline.
#[derive(Debug, Clone)]
pub struct AlarmVoice {
    sample_rate: u32,
    phase: f32,
    frequency: Envelope,
    gain: Envelope,
}

impl AlarmVoice {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            phase: 0.0,
            frequency: Envelope::new(SWEEP_START_HZ),
            gain: Envelope::new(0.0),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn gain(&self) -> f32 {
        self.gain.value()
    }

    pub fn frequency(&self) -> f32 {
        self.frequency.value()
    }

    /// Sweep up and fade in to `volume`
    pub fn start(&mut self, volume: f32) {
        self.frequency.set(SWEEP_START_HZ);
        self.frequency
            .ramp_to(SWEEP_END_HZ, SWEEP_DURATION, Curve::Exponential);
        self.gain.set(0.0);
        self.gain.ramp_to(volume, ATTACK_DURATION, Curve::Linear);
    }

    /// Dip and recover, one beat of the pulse
    pub fn pulse(&mut self, volume: f32) {
        self.gain.set(volume * PULSE_FLOOR);
        self.gain.ramp_to(volume, PULSE_RAMP, Curve::Linear);
    }

    /// Ramp back up from wherever the gain is (cancelled fade)
    pub fn resume(&mut self, volume: f32) {
        self.gain.ramp_to(volume, ATTACK_DURATION, Curve::Linear);
    }

    /// Fade from the current gain to near silence
    pub fn fade_out(&mut self) {
        self.gain.ramp_to(FADE_FLOOR, FADE_DURATION, Curve::Exponential);
    }

    /// Fill `out` with mono samples
    pub fn render(&mut self, out: &mut [f32]) {
        let dt = 1.0 / self.sample_rate as f32;
        for sample in out.iter_mut() {
            let frequency = self.frequency.advance(dt);
            let gain = self.gain.advance(dt);
            *sample = gain * (2.0 * self.phase - 1.0);
            self.phase = (self.phase + frequency * dt).fract();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 8_000;

    fn samples(duration: Duration) -> Vec<f32> {
        vec![0.0; (duration.as_secs_f32() * RATE as f32) as usize]
    }

    fn peak(buf: &[f32]) -> f32 {
        buf.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    #[test]
    fn test_sweep_and_attack() {
        let mut voice = AlarmVoice::new(RATE);
        voice.start(0.5);

        let mut buf = samples(Duration::from_millis(100));
        voice.render(&mut buf);
        assert!((voice.gain() - 0.5).abs() < 1e-3);
        assert!(voice.frequency() < SWEEP_END_HZ);

        let mut buf = samples(Duration::from_millis(450));
        voice.render(&mut buf);
        assert_eq!(voice.frequency(), SWEEP_END_HZ);
        assert!(peak(&buf) <= 0.5 + 1e-6);
        assert!(peak(&buf) > 0.4);
    }

    #[test]
    fn test_pulse_dips_then_recovers() {
        let mut voice = AlarmVoice::new(RATE);
        voice.start(0.8);
        voice.render(&mut samples(Duration::from_millis(200)));

        voice.pulse(0.8);
        assert!((voice.gain() - 0.24).abs() < 1e-5);
        voice.render(&mut samples(Duration::from_millis(600)));
        assert!((voice.gain() - 0.8).abs() < 1e-3);
    }

    #[test]
    fn test_fade_out_reaches_floor() {
        let mut voice = AlarmVoice::new(RATE);
        voice.start(0.5);
        voice.render(&mut samples(Duration::from_millis(200)));

        voice.fade_out();
        let mut buf = samples(Duration::from_millis(250));
        voice.render(&mut buf);
        assert!(voice.gain() < 0.5 && voice.gain() > FADE_FLOOR);

        voice.render(&mut samples(Duration::from_millis(300)));
        assert_eq!(voice.gain(), FADE_FLOOR);
    }
}
