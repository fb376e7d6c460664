//! Driver Monitoring System (DMS)
//!
//! Per-frame drowsiness analysis from facial landmarks:
//! - Eye aspect ratio (EAR) from six eyelid landmarks per eye
//! - Consecutive low-EAR frame counter with NORMAL/DROWSY classification
//! - Landmark detector contract and a synthetic detector

pub mod analysis;
pub mod config;
pub mod detector;
pub mod geometry;
pub mod state;

pub use analysis::FrameObservation;
pub use config::{DetectorOptions, DmsConfig};
pub use detector::{FaceLandmarks, FaceScript, LandmarkDetector, SyntheticFaceDetector};
pub use geometry::{eye_aspect_ratio, EyeSample, Landmark};
pub use state::{AlarmSignal, Classification, DrowsinessMonitor, DrowsinessState, StateUpdate};

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DmsError {
    /// A single frame could not be analysed; the next frame may succeed
    #[error("Landmark detection failed: {0}")]
    Detection(String),

    #[error("Landmark {index} missing from mesh of {len} points")]
    KeypointsMissing { index: usize, len: usize },
}
