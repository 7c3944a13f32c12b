//! Square face crop fed to the mesh model and the mapping back to the frame.

use crate::{landmarks::Landmark, utils::safe_cast::f64_to_i32_clamp};
use opencv::core::Rect;

/// Smallest crop side in pixels worth running the mesh on
const MIN_REGION_SIDE: i32 = 16;

/// Square pixel region of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    pub side: i32,
}

impl FaceRegion {
    /// Square around a box, grown by `margin` of its larger side on every
    /// edge, shifted (not shrunk) to stay inside the frame.
    ///
    /// `None` when the box is degenerate or the frame is too small.
    #[must_use]
    pub fn around(
        left: f64,
        top: f64,
        width: f64,
        height: f64,
        margin: f64,
        frame_width: i32,
        frame_height: i32,
    ) -> Option<Self> {
        let values = [left, top, width, height, margin];
        if values.iter().any(|v| !v.is_finite()) || width <= 0.0 || height <= 0.0 {
            return None;
        }

        let limit = frame_width.min(frame_height);
        let side = f64_to_i32_clamp((width.max(height) * (1.0 + 2.0 * margin)).round(), 0, limit);
        if side < MIN_REGION_SIDE {
            return None;
        }

        let half = f64::from(side) / 2.0;
        let x = f64_to_i32_clamp((left + width / 2.0 - half).round(), 0, frame_width - side);
        let y = f64_to_i32_clamp((top + height / 2.0 - half).round(), 0, frame_height - side);
        Some(Self { x, y, side })
    }

    /// Region around a detector box
    #[must_use]
    pub fn from_rect(rect: Rect, margin: f64, frame_width: i32, frame_height: i32) -> Option<Self> {
        Self::around(
            f64::from(rect.x),
            f64::from(rect.y),
            f64::from(rect.width),
            f64::from(rect.height),
            margin,
            frame_width,
            frame_height,
        )
    }

    /// Region around frame-normalized landmarks, used to track the face
    /// into the next frame
    #[must_use]
    pub fn from_landmarks(landmarks: &[Landmark], margin: f64, frame_width: i32, frame_height: i32) -> Option<Self> {
        let (fw, fh) = (f64::from(frame_width), f64::from(frame_height));
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for landmark in landmarks.iter().filter(|l| l.is_finite()) {
            min_x = min_x.min(landmark.x * fw);
            max_x = max_x.max(landmark.x * fw);
            min_y = min_y.min(landmark.y * fh);
            max_y = max_y.max(landmark.y * fh);
        }
        Self::around(min_x, min_y, max_x - min_x, max_y - min_y, margin, frame_width, frame_height)
    }

    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.side, self.side)
    }

    /// Map crop-normalized landmarks to frame-normalized ones.
    ///
    /// Depth is rescaled with x so it stays in frame-width units.
    #[must_use]
    pub fn to_frame(&self, landmarks: &[Landmark], frame_width: i32, frame_height: i32) -> Vec<Landmark> {
        let (fw, fh) = (f64::from(frame_width), f64::from(frame_height));
        let (x0, y0, side) = (f64::from(self.x), f64::from(self.y), f64::from(self.side));
        landmarks
            .iter()
            .map(|l| Landmark::new((x0 + l.x * side) / fw, (y0 + l.y * side) / fh, l.z * side / fw))
            .collect()
    }
}
