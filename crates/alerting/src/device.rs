//! Playback on the default output device

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{info, warn};

use crate::output::SynthOutput;
use crate::AlarmError;

/// Keeps the device stream running; dropping it closes the stream.
///
/// The stream lives on its own thread since `cpal::Stream` is not `Send`
/// on every platform.
pub struct DeviceOutput {
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl DeviceOutput {
    /// Open the default output device.
    ///
    /// Returns the [`SynthOutput`] to hand to the alarm controller; its
    /// voice is pulled by the device callback.
    pub fn open() -> Result<(SynthOutput, Self), AlarmError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("alarm-audio".into())
            .spawn(move || {
                let stream = match build_stream() {
                    Ok((output, stream)) => {
                        let _ = ready_tx.send(Ok(output));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Returns once the sender is dropped
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(unavailable)?;

        let output = ready_rx
            .recv()
            .map_err(|_| unavailable("audio thread exited"))??;

        Ok((
            output,
            Self {
                stop_tx: Some(stop_tx),
                thread: Some(thread),
            },
        ))
    }
}

impl Drop for DeviceOutput {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Audio thread panicked");
            }
        }
    }
}

fn build_stream() -> Result<(SynthOutput, cpal::Stream), AlarmError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| unavailable("no default output device"))?;
    let config = device.default_output_config().map_err(unavailable)?;

    let format = config.sample_format();
    if format != cpal::SampleFormat::F32 {
        return Err(unavailable(format!("unsupported sample format {format:?}")));
    }

    let sample_rate = config.sample_rate();
    let channels = usize::from(config.channels());
    let stream_config: cpal::StreamConfig = config.into();

    let output = SynthOutput::new(sample_rate);
    let renderer = output.renderer();
    let mut scratch = Vec::new();
    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _| renderer.render_interleaved(data, channels, &mut scratch),
            |err| warn!("Audio stream error: {}", err),
            Some(Duration::from_millis(200)),
        )
        .map_err(unavailable)?;
    stream.play().map_err(unavailable)?;

    info!("Audio output open: {} Hz, {} channel(s)", sample_rate, channels);
    Ok((output, stream))
}

fn unavailable(reason: impl ToString) -> AlarmError {
    AlarmError::AudioUnavailable(reason.to_string())
}
