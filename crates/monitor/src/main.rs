//! Drowsiness Monitor - Demo Entry Point
//!
//! Runs a scripted session on the synthetic camera and detector, printing
//! every published event as a JSON line. With the `audio-device` feature the
//! alarm plays on the default output device.

use std::time::Duration;

use alerting::{AlarmController, SynthOutput};
use anyhow::Context;
use camera_capture::SyntheticCamera;
use dms::SyntheticFaceDetector;
use monitor::{init_logging, Command, ConfigHandle, EventSink, MonitorEvent, SessionController, Settings};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let file = std::env::args().nth(1).unwrap_or_else(|| "monitor".to_string());
    let settings = Settings::load(&file).context("loading settings")?;
    init_logging(&settings.logging)?;

    info!("=== Drowsiness Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let (config, config_rx) = ConfigHandle::new(settings.monitor_config())?;
    let (events, events_rx) = EventSink::channel();
    let printer = tokio::spawn(print_events(events_rx));

    let (output, playback) = open_output(settings.demo.sample_rate);

    let mut controller = SessionController::new(
        SyntheticCamera::new(),
        SyntheticFaceDetector::new(settings.demo.script.clone()),
        AlarmController::new(Box::new(output)),
        config_rx,
        events,
    )
    .with_camera_config(settings.camera.clone());

    let (tx, rx) = mpsc::channel(16);
    tx.send(Command::Start(settings.camera.facing)).await?;

    let run_for = Duration::from_secs(settings.demo.run_seconds);
    let driver = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(run_for) => info!("Demo finished after {:?}", run_for),
            _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        }
        if tx.send(Command::Shutdown).await.is_err() {
            warn!("Monitor loop already gone");
        }
    });

    controller.run(rx).await;

    info!("Final configuration: {:?}", config.current());
    drop(controller);
    driver.abort();
    drop(playback);
    printer.await?;
    Ok(())
}

async fn print_events(mut events: mpsc::UnboundedReceiver<MonitorEvent>) {
    while let Some(event) = events.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Unprintable event {:?}: {}", event, e),
        }
    }
}

/// Default output device; a device that fails to open leaves the alarm
/// visual only.
#[cfg(feature = "audio-device")]
fn open_output(_sample_rate: u32) -> (SynthOutput, Option<alerting::DeviceOutput>) {
    match alerting::DeviceOutput::open() {
        Ok((output, device)) => (output, Some(device)),
        Err(alerting::AlarmError::AudioUnavailable(reason)) => {
            warn!("Audio output unavailable: {}", reason);
            (SynthOutput::unavailable(reason), None)
        }
    }
}

/// Without a device, a task pulls samples at the device rate and logs levels
#[cfg(not(feature = "audio-device"))]
fn open_output(sample_rate: u32) -> (SynthOutput, tokio::task::JoinHandle<()>) {
    const AUDIO_BLOCK: Duration = Duration::from_millis(20);

    let output = SynthOutput::new(sample_rate);
    let renderer = output.renderer();
    let handle = tokio::spawn(async move {
        let mut block = vec![0.0f32; (sample_rate as u128 * AUDIO_BLOCK.as_millis() / 1000) as usize];
        let mut ticker = tokio::time::interval(AUDIO_BLOCK);
        loop {
            ticker.tick().await;
            if !renderer.is_playing() {
                continue;
            }
            renderer.render(&mut block);
            let peak = block.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            tracing::trace!(peak, "audio block");
        }
    });
    (output, handle)
}
