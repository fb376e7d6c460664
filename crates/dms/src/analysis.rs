//! Per-frame geometry results

use serde::{Deserialize, Serialize};

use crate::detector::FaceLandmarks;
use crate::geometry::{combined_ear, EyeSample, LEFT_EYE_INDICES, RIGHT_EYE_INDICES};
use crate::DmsError;

/// Eye points in pixel space
pub type EyePixels = [(f32, f32); 6];

/// Output of the geometry stage for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameObservation {
    /// Mean EAR of both eyes; `None` when no face was found
    pub ear: Option<f32>,

    /// Whether a face was detected
    pub face_present: bool,

    /// Left eye landmarks scaled to the frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_eye: Option<EyePixels>,

    /// Right eye landmarks scaled to the frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_eye: Option<EyePixels>,
}

impl FrameObservation {
    /// Frame without a face
    pub fn no_face() -> Self {
        Self::default()
    }

    /// Face present with a known EAR and no eye points
    pub fn with_ear(ear: f32) -> Self {
        Self {
            ear: Some(ear),
            face_present: true,
            ..Default::default()
        }
    }

    /// Reduce detector output to an observation.
    ///
    /// Only the first face is considered; the detector is asked for one.
    pub fn from_landmarks(
        face: Option<&FaceLandmarks>,
        width: u32,
        height: u32,
    ) -> Result<Self, DmsError> {
        let Some(face) = face else {
            return Ok(Self::no_face());
        };

        let left = EyeSample::from_mesh(&face.points, &LEFT_EYE_INDICES)?;
        let right = EyeSample::from_mesh(&face.points, &RIGHT_EYE_INDICES)?;
        let ear = combined_ear(
            left.aspect_ratio(width, height),
            right.aspect_ratio(width, height),
        );

        Ok(Self {
            ear: Some(ear),
            face_present: true,
            left_eye: Some(left.to_pixels(width, height)),
            right_eye: Some(right.to_pixels(width, height)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::synthetic_mesh;

    #[test]
    fn test_no_face() {
        let obs = FrameObservation::from_landmarks(None, 640, 480).unwrap();
        assert!(!obs.face_present);
        assert_eq!(obs.ear, None);
        assert!(obs.left_eye.is_none());
    }

    #[test]
    fn test_from_synthetic_mesh() {
        let face = synthetic_mesh(0.27, 640, 480);
        let obs = FrameObservation::from_landmarks(Some(&face), 640, 480).unwrap();
        assert!(obs.face_present);
        let ear = obs.ear.unwrap();
        assert!((ear - 0.27).abs() < 1e-3, "ear = {ear}");
        assert!(obs.right_eye.is_some());
    }

    #[test]
    fn test_truncated_mesh() {
        let face = FaceLandmarks::new(vec![Default::default(); 40]);
        let err = FrameObservation::from_landmarks(Some(&face), 640, 480).unwrap_err();
        assert!(matches!(err, DmsError::KeypointsMissing { len: 40, .. }));
    }
}
