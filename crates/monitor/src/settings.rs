//! Monitor configuration, live updates, and settings loading

use std::sync::Arc;

use alerting::AlarmConfig;
use camera_capture::CameraConfig;
use dms::{DmsConfig, FaceScript};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}

/// Operator-tunable configuration, read on every frame and alarm pulse
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub dms: DmsConfig,
    pub alarm: AlarmConfig,
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ear = self.dms.ear_threshold;
        if !(ear > 0.0 && ear <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "ear_threshold",
                value: ear as f64,
                min: 0.0,
                max: 1.0,
            });
        }
        if self.dms.consecutive_frame_threshold == 0 {
            return Err(ConfigError::OutOfRange {
                field: "consecutive_frame_threshold",
                value: 0.0,
                min: 1.0,
                max: u32::MAX as f64,
            });
        }
        let volume = self.alarm.volume;
        if !(0.0..=1.0).contains(&volume) {
            return Err(ConfigError::OutOfRange {
                field: "alarm_volume",
                value: volume as f64,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(())
    }
}

/// Write side of the live configuration.
///
/// Readers hold a `watch::Receiver` and always see the latest value.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    tx: Arc<watch::Sender<MonitorConfig>>,
}

impl ConfigHandle {
    pub fn new(config: MonitorConfig) -> Result<(Self, watch::Receiver<MonitorConfig>), ConfigError> {
        config.validate()?;
        let (tx, rx) = watch::channel(config);
        Ok((Self { tx: Arc::new(tx) }, rx))
    }

    pub fn subscribe(&self) -> watch::Receiver<MonitorConfig> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> MonitorConfig {
        self.tx.borrow().clone()
    }

    /// Apply an edit; invalid results are rejected and nothing changes
    pub fn update(&self, edit: impl FnOnce(&mut MonitorConfig)) -> Result<(), ConfigError> {
        let mut next = self.current();
        edit(&mut next);
        next.validate()?;
        self.tx.send_replace(next);
        Ok(())
    }

    pub fn set_ear_threshold(&self, threshold: f32) -> Result<(), ConfigError> {
        self.update(|c| c.dms.ear_threshold = threshold)
    }

    pub fn set_consecutive_frame_threshold(&self, frames: u32) -> Result<(), ConfigError> {
        self.update(|c| c.dms.consecutive_frame_threshold = frames)
    }

    pub fn set_alarm_volume(&self, volume: f32) -> Result<(), ConfigError> {
        self.update(|c| c.alarm.volume = volume)
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Max level: trace, debug, info, warn, error
    pub level: String,
    /// JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Demo binary settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    /// Stop after this many seconds
    pub run_seconds: u64,
    /// Audio sample rate for the synthesized alarm
    pub sample_rate: u32,
    /// Scripted detector output, looped
    pub script: Vec<FaceScript>,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            run_seconds: 20,
            sample_rate: 48_000,
            script: vec![
                FaceScript::Eyes { ear: 0.30, frames: 60 },
                FaceScript::Eyes { ear: 0.10, frames: 45 },
                FaceScript::Eyes { ear: 0.30, frames: 30 },
                FaceScript::NoFace { frames: 15 },
                FaceScript::Fail { frames: 1 },
            ],
        }
    }
}

/// Everything the binary reads at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub dms: DmsConfig,
    pub alarm: AlarmConfig,
    pub camera: CameraConfig,
    pub logging: LoggingSettings,
    pub demo: DemoSettings,
}

impl Settings {
    /// Load from an optional file (any format `config` understands) and
    /// `MONITOR__SECTION__KEY` environment variables.
    pub fn load(file: &str) -> Result<Self, ConfigError> {
        let raw = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix("MONITOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = raw.try_deserialize()?;
        settings.monitor_config().validate()?;
        info!("Settings loaded from {} (+ environment)", file);
        Ok(settings)
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            dms: self.dms.clone(),
            alarm: self.alarm.clone(),
        }
    }
}
