//! Landmark value types shared by the provider and the pose estimator.

use crate::constants::LANDMARK_DIMENSIONS;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// One face mesh keypoint in normalized image coordinates.
///
/// `x` and `y` are relative to the frame width and height, `z` is the
/// model's relative depth.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Landmark {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// A landmark with any non-finite coordinate counts as absent
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    #[must_use]
    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Build landmarks from a flat `[x0, y0, z0, x1, ...]` buffer, dividing
    /// every coordinate by `scale`. Trailing values that do not complete a
    /// point are ignored.
    #[must_use]
    pub fn from_flat(values: &[f32], scale: f64) -> Vec<Self> {
        values
            .chunks_exact(LANDMARK_DIMENSIONS)
            .map(|p| Self::new(f64::from(p[0]) / scale, f64::from(p[1]) / scale, f64::from(p[2]) / scale))
            .collect()
    }
}

/// A completed detection together with the pixel size of its frame
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    pub landmarks: Vec<Landmark>,
    pub width: u32,
    pub height: u32,
    /// Capture sequence number of the frame the landmarks came from
    pub sequence: u64,
}
