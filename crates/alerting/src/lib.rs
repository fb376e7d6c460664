//! Alerting System
//!
//! Owns the audible drowsiness alarm: when it sounds, how it is shaped
//! (sweep, pulse, fade) and when its timers fire.

mod controller;
#[cfg(feature = "cpal")]
mod device;
mod envelope;
mod output;
mod timers;
mod voice;

pub use controller::{AlarmCause, AlarmController, AlarmPhase, AlarmState, TEST_DURATION};
#[cfg(feature = "cpal")]
pub use device::DeviceOutput;
pub use envelope::{Curve, Envelope};
pub use output::{AudioOutput, SharedVoice, SynthOutput, VoiceRenderer};
pub use timers::{AlarmTask, TimerQueue};
pub use voice::{AlarmVoice, FADE_DURATION, PULSE_PERIOD};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Alarm error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlarmError {
    /// Tone engine could not start; the alarm is visual only
    #[error("Audio output unavailable: {0}")]
    AudioUnavailable(String),
}

/// Alarm configuration, re-read on every pulse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlarmConfig {
    /// Peak amplitude, 0-1
    pub volume: f32,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self { volume: 0.5 }
    }
}
