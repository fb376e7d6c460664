//! Camera Capture Library for Drowsiness Monitoring
//!
//! Defines what the monitor needs from a camera:
//! - a capture device that opens a stream for a requested facing
//! - a frame stream delivering frames at a negotiated rate
//! - a synthetic camera for demos and tests

pub mod device;
pub mod frame;
pub mod synthetic;

pub use device::{CaptureDevice, FrameStream, StreamSettings};
pub use frame::VideoFrame;
pub use synthetic::SyntheticCamera;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("No {0} camera available")]
    NoDevice(Facing),

    #[error("Failed to open camera: {0}")]
    Open(String),
}

/// Which physical camera to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// User-facing camera
    Front,
    /// Environment-facing camera
    #[default]
    Rear,
}

impl Facing {
    /// The other camera
    pub fn opposite(self) -> Self {
        match self {
            Facing::Front => Facing::Rear,
            Facing::Rear => Facing::Front,
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facing::Front => f.write_str("Front"),
            Facing::Rear => f.write_str("Rear"),
        }
    }
}

/// Camera configuration (ideal constraints; the device may negotiate down)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Requested camera
    pub facing: Facing,
    /// Ideal capture width
    pub width: u32,
    /// Ideal capture height
    pub height: u32,
    /// Ideal frame rate
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            facing: Facing::default(),
            width: 1280,
            height: 720,
            fps: 30,
        }
    }
}

impl CameraConfig {
    /// Default constraints for the given camera
    pub fn for_facing(facing: Facing) -> Self {
        Self {
            facing,
            ..Default::default()
        }
    }

    /// Same constraints, other camera
    pub fn with_facing(&self, facing: Facing) -> Self {
        Self {
            facing,
            ..self.clone()
        }
    }
}
