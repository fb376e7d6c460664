//! Eye aspect ratio geometry

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Face-mesh indices of the left eye: outer corner, upper lid (2), inner corner, lower lid (2)
pub const LEFT_EYE_INDICES: [usize; 6] = [33, 160, 158, 133, 153, 144];

/// Face-mesh indices of the right eye, same anatomical order
pub const RIGHT_EYE_INDICES: [usize; 6] = [362, 385, 387, 263, 373, 380];

/// Normalized 2-D landmark, `(x, y)` in `[0, 1]` relative to the frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Scale to pixel space
    pub fn to_pixel(self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

/// Six landmarks of one eye in one frame.
///
/// Order: p1 outer corner, p2 and p3 upper lid, p4 inner corner,
/// p5 and p6 lower lid (p5 below p3, p6 below p2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeSample {
    pub points: [Landmark; 6],
}

impl EyeSample {
    pub fn new(points: [Landmark; 6]) -> Self {
        Self { points }
    }

    /// Pick an eye out of a face mesh
    pub fn from_mesh(mesh: &[Landmark], indices: &[usize; 6]) -> Result<Self, DmsError> {
        let mut points = [Landmark::default(); 6];
        for (slot, &index) in points.iter_mut().zip(indices) {
            *slot = *mesh.get(index).ok_or(DmsError::KeypointsMissing {
                index,
                len: mesh.len(),
            })?;
        }
        Ok(Self { points })
    }

    /// Points in pixel space, for overlays
    pub fn to_pixels(&self, width: u32, height: u32) -> [(f32, f32); 6] {
        self.points.map(|p| p.to_pixel(width, height))
    }

    pub fn aspect_ratio(&self, width: u32, height: u32) -> f32 {
        eye_aspect_ratio(&self.points, width, height)
    }
}

/// EAR = (|p2-p6| + |p3-p5|) / (2 |p1-p4|), measured in pixels.
///
/// A zero-width eye yields `f32::INFINITY`, which never counts as closed.
pub fn eye_aspect_ratio(points: &[Landmark; 6], width: u32, height: u32) -> f32 {
    let [p1, p2, p3, p4, p5, p6] = points.map(|p| p.to_pixel(width, height));

    let horizontal = distance(p1, p4);
    if horizontal == 0.0 {
        return f32::INFINITY;
    }

    (distance(p2, p6) + distance(p3, p5)) / (2.0 * horizontal)
}

/// Frame EAR: mean of both eyes
pub fn combined_ear(left: f32, right: f32) -> f32 {
    (left + right) / 2.0
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - b.0).hypot(a.1 - b.1)
}
