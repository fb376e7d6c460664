//! Audio output seam

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use tracing::{debug, info};

use crate::voice::AlarmVoice;
use crate::AlarmError;

/// Voice shared between the controller and the audio callback
pub type SharedVoice = Arc<Mutex<AlarmVoice>>;

pub(crate) fn lock_voice(voice: &SharedVoice) -> MutexGuard<'_, AlarmVoice> {
    voice.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Non-blocking lock for the audio callback
fn try_lock<T>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

/// Sink that plays the alarm voice
pub trait AudioOutput: Send {
    /// Sample rate voices should be built for
    fn sample_rate(&self) -> u32;

    /// Start pulling samples from `voice`
    fn start(&mut self, voice: SharedVoice) -> Result<(), AlarmError>;

    /// Stop pulling samples and release the voice
    fn stop(&mut self);
}

type VoiceSlot = Arc<Mutex<Option<SharedVoice>>>;

/// Output that hands the current voice to a host audio callback.
///
/// The host keeps a [`VoiceRenderer`] and calls `render` from its device
/// callback; while no alarm is playing it renders silence.
#[derive(Debug, Clone)]
pub struct SynthOutput {
    sample_rate: u32,
    slot: VoiceSlot,
    unavailable: Option<String>,
}

impl SynthOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            slot: Arc::new(Mutex::new(None)),
            unavailable: None,
        }
    }

    /// An output whose device failed to initialise
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::new(48_000)
        }
    }

    pub fn renderer(&self) -> VoiceRenderer {
        VoiceRenderer {
            slot: self.slot.clone(),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<SharedVoice>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AudioOutput for SynthOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn start(&mut self, voice: SharedVoice) -> Result<(), AlarmError> {
        if let Some(reason) = &self.unavailable {
            return Err(AlarmError::AudioUnavailable(reason.clone()));
        }
        info!("Alarm tone started at {} Hz", self.sample_rate);
        *self.slot() = Some(voice);
        Ok(())
    }

    fn stop(&mut self) {
        if self.slot().take().is_some() {
            debug!("Alarm tone released");
        }
    }
}

/// Host-side handle that pulls samples
#[derive(Debug, Clone)]
pub struct VoiceRenderer {
    slot: VoiceSlot,
}

impl VoiceRenderer {
    /// Render the playing voice into `out`, or silence.
    ///
    /// Never waits: a block that races a control-side update is silent.
    pub fn render(&self, out: &mut [f32]) {
        let Some(slot) = try_lock(&self.slot) else {
            out.fill(0.0);
            return;
        };
        match slot.as_ref().and_then(|voice| try_lock(&**voice)) {
            Some(mut voice) => voice.render(out),
            None => out.fill(0.0),
        };
    }

    /// Render into an interleaved buffer, the mono voice on every channel.
    /// `scratch` is reused between callbacks.
    pub fn render_interleaved(&self, data: &mut [f32], channels: usize, scratch: &mut Vec<f32>) {
        let channels = channels.max(1);
        scratch.resize(data.len().div_ceil(channels), 0.0);
        self.render(scratch);
        for (frame, &sample) in data.chunks_mut(channels).zip(scratch.iter()) {
            frame.fill(sample);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
