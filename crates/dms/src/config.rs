//! DMS configuration

use serde::{Deserialize, Serialize};

/// Drowsiness detection configuration.
///
/// Read on every frame; edits take effect on the very next frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DmsConfig {
    /// EAR below this counts as a closed-eye frame (recommended 0.1-0.4)
    pub ear_threshold: f32,

    /// Consecutive closed-eye frames before DROWSY (recommended 5-90)
    pub consecutive_frame_threshold: u32,

    /// Options handed to the landmark detector
    pub detector: DetectorOptions,
}

impl Default for DmsConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.18,
            consecutive_frame_threshold: 30,
            detector: DetectorOptions::default(),
        }
    }
}

/// Face-landmark model options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    pub max_faces: u32,
    /// Include refined iris/eyelid landmarks (478-point mesh)
    pub refine_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            max_faces: 1,
            refine_landmarks: true,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}
