//! Drowsiness Monitor
//!
//! Ties camera, landmark detector, drowsiness state machine and alarm into
//! one session, and publishes what a dashboard needs to render.

mod events;
mod fps;
mod session;
mod settings;

pub use events::{EventSink, MonitorEvent};
pub use fps::FpsMeter;
pub use session::{CameraSession, Command, FrameReport, SessionController, SessionError, SessionHandle};
pub use settings::{ConfigError, ConfigHandle, DemoSettings, LoggingSettings, MonitorConfig, Settings};

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging
pub fn init_logging(settings: &LoggingSettings) -> anyhow::Result<()> {
    let level = Level::from_str(&settings.level).unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if settings.json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}
