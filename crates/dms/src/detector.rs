//! Face-landmark detector contract

use std::future::Future;

use camera_capture::VideoFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DetectorOptions;
use crate::geometry::{Landmark, LEFT_EYE_INDICES, RIGHT_EYE_INDICES};
use crate::DmsError;

/// Points in the mesh with refined iris landmarks
pub const REFINED_MESH_POINTS: usize = 478;

/// Landmarks of one detected face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    /// Normalized mesh points in model order
    pub points: Vec<Landmark>,
}

impl FaceLandmarks {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }
}

/// External face-landmark model.
///
/// Returns the first detected face, or `None` if there is none. The session
/// awaits each call before submitting the next frame.
pub trait LandmarkDetector: Send {
    fn detect(
        &mut self,
        frame: &VideoFrame,
        options: &DetectorOptions,
    ) -> impl Future<Output = Result<Option<FaceLandmarks>, DmsError>> + Send;
}

/// One step of a synthetic detector script
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaceScript {
    /// Face present with eyes at the given EAR
    Eyes { ear: f32, frames: u32 },
    /// No face in view
    NoFace { frames: u32 },
    /// Detector fails on these frames
    Fail { frames: u32 },
}

impl FaceScript {
    fn frames(&self) -> u32 {
        match *self {
            FaceScript::Eyes { frames, .. }
            | FaceScript::NoFace { frames }
            | FaceScript::Fail { frames } => frames,
        }
    }
}

/// Detector that plays back a looping script instead of running a model
#[derive(Debug, Clone)]
pub struct SyntheticFaceDetector {
    script: Vec<FaceScript>,
    step: usize,
    frame_in_step: u32,
}

impl SyntheticFaceDetector {
    pub fn new(script: Vec<FaceScript>) -> Self {
        let script: Vec<_> = script.into_iter().filter(|s| s.frames() > 0).collect();
        if script.is_empty() {
            warn!("Empty detector script, falling back to open eyes");
        }
        Self {
            script,
            step: 0,
            frame_in_step: 0,
        }
    }

    /// Always reports a face with open eyes
    pub fn open_eyes() -> Self {
        Self::new(vec![FaceScript::Eyes { ear: 0.3, frames: 1 }])
    }

    /// Per-frame EAR sequence with a face present throughout
    pub fn from_ears(ears: &[f32]) -> Self {
        Self::new(ears.iter().map(|&ear| FaceScript::Eyes { ear, frames: 1 }).collect())
    }

    fn advance(&mut self) -> FaceScript {
        let Some(current) = self.script.get(self.step).copied() else {
            return FaceScript::Eyes { ear: 0.3, frames: 1 };
        };
        self.frame_in_step += 1;
        if self.frame_in_step >= current.frames() {
            self.frame_in_step = 0;
            self.step = (self.step + 1) % self.script.len();
        }
        current
    }
}

impl LandmarkDetector for SyntheticFaceDetector {
    async fn detect(
        &mut self,
        frame: &VideoFrame,
        options: &DetectorOptions,
    ) -> Result<Option<FaceLandmarks>, DmsError> {
        let step = self.advance();
        if options.max_faces == 0 {
            return Ok(None);
        }

        match step {
            FaceScript::Eyes { ear, .. } => {
                let (width, height) = frame.dimensions_or_default();
                debug!(sequence = frame.sequence, ear, "synthetic face");
                Ok(Some(synthetic_mesh(ear, width, height)))
            }
            FaceScript::NoFace { .. } => Ok(None),
            FaceScript::Fail { .. } => Err(DmsError::Detection(format!(
                "synthetic failure on frame {}",
                frame.sequence
            ))),
        }
    }
}

/// Build a refined mesh whose eyes measure `ear` on a `width`x`height` frame.
pub fn synthetic_mesh(ear: f32, width: u32, height: u32) -> FaceLandmarks {
    let mut points = vec![Landmark::new(0.5, 0.5); REFINED_MESH_POINTS];
    place_eye(&mut points, &LEFT_EYE_INDICES, 0.4, ear, width, height);
    place_eye(&mut points, &RIGHT_EYE_INDICES, 0.6, ear, width, height);
    FaceLandmarks::new(points)
}

fn place_eye(points: &mut [Landmark], indices: &[usize; 6], cx: f32, ear: f32, width: u32, height: u32) {
    const EYE_WIDTH: f32 = 0.08;
    const CY: f32 = 0.4;

    // Both lid gaps equal, so EAR = gap_px / width_px.
    let gap = ear * EYE_WIDTH * width as f32 / height as f32;
    let half = EYE_WIDTH / 2.0;
    let third = EYE_WIDTH / 6.0;

    let eye = [
        Landmark::new(cx - half, CY),
        Landmark::new(cx - third, CY - gap / 2.0),
        Landmark::new(cx + third, CY - gap / 2.0),
        Landmark::new(cx + half, CY),
        Landmark::new(cx + third, CY + gap / 2.0),
        Landmark::new(cx - third, CY + gap / 2.0),
    ];
    for (&index, landmark) in indices.iter().zip(eye) {
        points[index] = landmark;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FrameObservation;

    fn frame(sequence: u32) -> VideoFrame {
        VideoFrame::new(Vec::new(), 1280, 720, 0, sequence)
    }

    #[tokio::test]
    async fn test_script_playback_loops() {
        let mut detector = SyntheticFaceDetector::new(vec![
            FaceScript::Eyes { ear: 0.3, frames: 2 },
            FaceScript::NoFace { frames: 1 },
            FaceScript::Fail { frames: 1 },
        ]);
        let options = DetectorOptions::default();

        assert!(detector.detect(&frame(0), &options).await.unwrap().is_some());
        assert!(detector.detect(&frame(1), &options).await.unwrap().is_some());
        assert!(detector.detect(&frame(2), &options).await.unwrap().is_none());
        assert!(detector.detect(&frame(3), &options).await.is_err());
        assert!(detector.detect(&frame(4), &options).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_mesh_matches_requested_ear() {
        let mut detector = SyntheticFaceDetector::from_ears(&[0.12]);
        let face = detector
            .detect(&frame(0), &DetectorOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(face.points.len(), REFINED_MESH_POINTS);

        let obs = FrameObservation::from_landmarks(Some(&face), 1280, 720).unwrap();
        assert!((obs.ear.unwrap() - 0.12).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_empty_script_is_open_eyes() {
        let mut detector = SyntheticFaceDetector::new(vec![FaceScript::NoFace { frames: 0 }]);
        let face = detector.detect(&frame(0), &DetectorOptions::default()).await.unwrap();
        assert!(face.is_some());
    }
}
