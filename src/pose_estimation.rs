use crate::{
    constants::{
        landmark_index::{
            BOTTOM_CHIN, LEFT_CHEEK, LEFT_EYE, LEFT_JAW, NOSE_BRIDGE, NOSE_TIP, RIGHT_CHEEK, RIGHT_EYE, RIGHT_JAW,
            TOP_FOREHEAD,
        },
        DEFAULT_LEVEL_TOLERANCE_DEG, DEFAULT_SIDE_THRESHOLD, DEFAULT_TOO_CLOSE_THRESHOLD, DEFAULT_TOO_FAR_THRESHOLD,
        EPSILON, EYE_DISTANCE_WEIGHT, FACE_HEIGHT_WEIGHT, JAW_WIDTH_WEIGHT,
    },
    landmarks::Landmark,
    Error, Result,
};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Landmarks that must be present for a pose to be computed
const REQUIRED_LANDMARKS: [(usize, &str); 6] = [
    (NOSE_TIP, "nose tip"),
    (NOSE_BRIDGE, "nose bridge"),
    (LEFT_EYE, "left eye"),
    (RIGHT_EYE, "right eye"),
    (TOP_FOREHEAD, "top forehead"),
    (BOTTOM_CHIN, "bottom chin"),
];

/// Horizontal head position as seen on the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Left,
    Right,
    Center,
}

/// Distance-from-camera classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceStatus {
    TooFar,
    Good,
    TooClose,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Center => "center",
        })
    }
}

impl fmt::Display for DistanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TooFar => "too_far",
            Self::Good => "good",
            Self::TooClose => "too_close",
        })
    }
}

/// Face bounding box in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Head pose summary for a single frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseResult {
    /// Raw camera-space x of the nose tip
    pub normalized_x: f64,
    /// Nose tip x in the same space as `bounding_box`
    pub display_x: f64,
    pub position: Position,
    pub face_width: f64,
    pub face_height: f64,
    /// Eye line angle in degrees, in (-180, 180]
    pub tilt_angle: f64,
    pub is_level: bool,
    pub distance_status: DistanceStatus,
    pub is_good_distance: bool,
    pub bounding_box: BoundingBox,
    /// x component of the unit face normal
    pub side_projection: f64,
    /// z component of the unit face normal
    pub forward_projection: f64,
    /// Composite size used for the distance classification
    pub weighted_size: f64,
}

/// Classification thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseThresholds {
    /// |side projection| strictly above this is left/right
    pub side_threshold: f64,
    /// Weighted size strictly below this is too far
    pub too_far: f64,
    /// Weighted size strictly above this is too close
    pub too_close: f64,
    /// |tilt| strictly below this is level
    pub level_tolerance_deg: f64,
    pub face_height_weight: f64,
    pub eye_distance_weight: f64,
    pub jaw_width_weight: f64,
}

impl Default for PoseThresholds {
    fn default() -> Self {
        Self {
            side_threshold: DEFAULT_SIDE_THRESHOLD,
            too_far: DEFAULT_TOO_FAR_THRESHOLD,
            too_close: DEFAULT_TOO_CLOSE_THRESHOLD,
            level_tolerance_deg: DEFAULT_LEVEL_TOLERANCE_DEG,
            face_height_weight: FACE_HEIGHT_WEIGHT,
            eye_distance_weight: EYE_DISTANCE_WEIGHT,
            jaw_width_weight: JAW_WIDTH_WEIGHT,
        }
    }
}

/// Head pose estimator working on face mesh landmarks
///
/// The estimator is a pure function of its inputs: the same landmarks and
/// frame size always yield the same result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimator {
    thresholds: PoseThresholds,
    mirrored: bool,
}

impl Default for PoseEstimator {
    fn default() -> Self {
        Self::new(PoseThresholds::default(), true)
    }
}

impl PoseEstimator {
    /// Create an estimator.
    ///
    /// With `mirrored` set, the results describe a horizontally flipped
    /// preview: position labels are swapped and the bounding box is flipped.
    #[must_use]
    pub const fn new(thresholds: PoseThresholds, mirrored: bool) -> Self {
        Self { thresholds, mirrored }
    }

    #[must_use]
    pub const fn thresholds(&self) -> &PoseThresholds {
        &self.thresholds
    }

    #[must_use]
    pub const fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    /// Estimate the head pose from face mesh landmarks
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The frame size is not positive and finite
    /// - One of the required landmarks is absent (`MissingLandmarks`)
    /// - The face normal has zero length (`DegenerateGeometry`)
    /// - The cheek points are absent or the result is not finite (`PoseComputation`)
    pub fn estimate(&self, landmarks: &[Landmark], image_width: f64, image_height: f64) -> Result<PoseResult> {
        if !(image_width.is_finite() && image_width > 0.0 && image_height.is_finite() && image_height > 0.0) {
            return Err(Error::InvalidInput(format!(
                "Frame size must be positive, got {image_width}x{image_height}"
            )));
        }

        let missing: Vec<&'static str> = REQUIRED_LANDMARKS
            .iter()
            .filter(|(idx, _)| point(landmarks, *idx).is_none())
            .map(|&(_, name)| name)
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingLandmarks(missing));
        }

        let required = |idx: usize| {
            point(landmarks, idx).ok_or_else(|| Error::PoseComputation(format!("Landmark {idx} is unavailable")))
        };
        let nose_tip = required(NOSE_TIP)?;
        let nose_bridge = required(NOSE_BRIDGE)?;
        let left_eye = required(LEFT_EYE)?;
        let right_eye = required(RIGHT_EYE)?;
        let top_forehead = required(TOP_FOREHEAD)?;
        let bottom_chin = required(BOTTOM_CHIN)?;
        let left_cheek = required(LEFT_CHEEK)?;
        let right_cheek = required(RIGHT_CHEEK)?;
        let left_jaw = required(LEFT_JAW)?;
        let right_jaw = required(RIGHT_JAW)?;

        // Face normal from the eye line and the nose line
        let eye_line = right_eye - left_eye;
        let nose_line = nose_tip - nose_bridge;
        let normal = eye_line.cross(&nose_line);
        let length = normal.norm();
        if length < EPSILON {
            return Err(Error::DegenerateGeometry("face normal has zero length".to_string()));
        }
        let normal = normal / length;
        let side_projection = normal.x;
        let forward_projection = normal.z;
        let position = self.classify_position(side_projection);

        let face_width = (right_cheek.x - left_cheek.x).abs();
        let face_height = (top_forehead.y - bottom_chin.y).abs();
        let eye_distance = eye_line.norm();
        let jaw_width = (right_jaw - left_jaw).norm();
        let weighted_size = self.thresholds.face_height_weight * face_height
            + self.thresholds.eye_distance_weight * eye_distance
            + self.thresholds.jaw_width_weight * jaw_width;
        let distance_status = self.classify_distance(weighted_size);

        let tilt_angle = eye_line.y.atan2(eye_line.x).to_degrees();
        let is_level = self.is_level(tilt_angle);

        let bounding_box = self.bounding_box(landmarks, image_width, image_height)?;
        let display_x = if self.mirrored { 1.0 - nose_tip.x } else { nose_tip.x };

        let result = PoseResult {
            normalized_x: nose_tip.x,
            display_x,
            position,
            face_width,
            face_height,
            tilt_angle,
            is_level,
            distance_status,
            is_good_distance: distance_status == DistanceStatus::Good,
            bounding_box,
            side_projection,
            forward_projection,
            weighted_size,
        };

        let values = [
            result.face_width,
            result.face_height,
            result.tilt_angle,
            result.side_projection,
            result.forward_projection,
            result.weighted_size,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::PoseComputation("non-finite pose value".to_string()));
        }

        Ok(result)
    }

    /// Classify the side projection into a display position
    #[must_use]
    pub fn classify_position(&self, side_projection: f64) -> Position {
        let threshold = self.thresholds.side_threshold;
        let (positive, negative) = if self.mirrored {
            (Position::Right, Position::Left)
        } else {
            (Position::Left, Position::Right)
        };
        if side_projection > threshold {
            positive
        } else if side_projection < -threshold {
            negative
        } else {
            Position::Center
        }
    }

    /// Classify the weighted face size into a distance status
    #[must_use]
    pub fn classify_distance(&self, weighted_size: f64) -> DistanceStatus {
        if weighted_size < self.thresholds.too_far {
            DistanceStatus::TooFar
        } else if weighted_size > self.thresholds.too_close {
            DistanceStatus::TooClose
        } else {
            DistanceStatus::Good
        }
    }

    /// Whether a tilt angle in degrees counts as level
    #[must_use]
    pub fn is_level(&self, tilt_angle: f64) -> bool {
        tilt_angle.abs() < self.thresholds.level_tolerance_deg
    }

    /// Pixel bounding box over every present landmark
    fn bounding_box(&self, landmarks: &[Landmark], image_width: f64, image_height: f64) -> Result<BoundingBox> {
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for landmark in landmarks.iter().filter(|l| l.is_finite()) {
            let x = landmark.x * image_width;
            let y = landmark.y * image_height;
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }

        if !(min_x.is_finite() && max_x.is_finite() && min_y.is_finite() && max_y.is_finite()) {
            return Err(Error::PoseComputation("no landmarks to bound".to_string()));
        }

        let left = if self.mirrored { image_width - max_x } else { min_x };

        Ok(BoundingBox {
            left,
            top: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }
}

/// Estimate the pose with the default thresholds and a mirrored display
///
/// # Errors
///
/// See [`PoseEstimator::estimate`].
pub fn estimate_pose(landmarks: &[Landmark], image_width: f64, image_height: f64) -> Result<PoseResult> {
    PoseEstimator::default().estimate(landmarks, image_width, image_height)
}

fn point(landmarks: &[Landmark], idx: usize) -> Option<Vector3<f64>> {
    landmarks
        .get(idx)
        .filter(|l| l.is_finite())
        .map(Landmark::to_vector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NUM_FACE_MESH_LANDMARKS;

    /// Frontal face centred in the frame, key points scaled around (0.5, 0.5)
    fn synthetic_face(scale: f64) -> Vec<Landmark> {
        let mut landmarks = vec![Landmark::new(0.5, 0.5, 0.0); NUM_FACE_MESH_LANDMARKS];
        let mut set = |idx: usize, dx: f64, dy: f64, z: f64| {
            landmarks[idx] = Landmark::new(0.5 + dx * scale, 0.5 + dy * scale, z);
        };
        set(LEFT_EYE, -0.1, -0.1, 0.0);
        set(RIGHT_EYE, 0.1, -0.1, 0.0);
        set(NOSE_BRIDGE, 0.0, -0.1, 0.0);
        set(NOSE_TIP, 0.0, 0.0, -0.05);
        set(TOP_FOREHEAD, 0.0, -0.3, 0.0);
        set(BOTTOM_CHIN, 0.0, 0.3, 0.0);
        set(LEFT_CHEEK, -0.2, 0.0, 0.0);
        set(RIGHT_CHEEK, 0.2, 0.0, 0.0);
        landmarks
    }

    #[test]
    fn test_frontal_face() {
        let result = estimate_pose(&synthetic_face(1.0), 1280.0, 720.0).unwrap();

        assert_eq!(result.position, Position::Center);
        assert!(result.side_projection.abs() < 1e-9);
        assert!(result.forward_projection > 0.0);
        assert!((result.face_width - 0.4).abs() < 1e-9);
        assert!((result.face_height - 0.6).abs() < 1e-9);
        // 0.4 * 0.6 + 0.3 * 0.2 + 0.3 * 0.4
        assert!((result.weighted_size - 0.42).abs() < 1e-9);
        assert_eq!(result.distance_status, DistanceStatus::Good);
        assert!(result.is_good_distance);
        assert!(result.tilt_angle.abs() < 1e-9);
        assert!(result.is_level);
        assert!((result.normalized_x - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_turned_head() {
        let mut landmarks = synthetic_face(1.0);
        landmarks[RIGHT_EYE].z = 0.3;
        let result = estimate_pose(&landmarks, 1280.0, 720.0).unwrap();
        assert!(result.side_projection < -0.7);
        assert_eq!(result.position, Position::Left);

        landmarks[RIGHT_EYE].z = -0.3;
        let result = estimate_pose(&landmarks, 1280.0, 720.0).unwrap();
        assert!(result.side_projection > 0.7);
        assert_eq!(result.position, Position::Right);

        let raw = PoseEstimator::new(PoseThresholds::default(), false);
        assert_eq!(raw.estimate(&landmarks, 1280.0, 720.0).unwrap().position, Position::Left);
    }

    #[test]
    fn test_distance_classification() {
        let far = estimate_pose(&synthetic_face(0.5), 1280.0, 720.0).unwrap();
        assert_eq!(far.distance_status, DistanceStatus::TooFar);
        assert!(!far.is_good_distance);

        let close = estimate_pose(&synthetic_face(1.2), 1280.0, 720.0).unwrap();
        assert_eq!(close.distance_status, DistanceStatus::TooClose);
        assert!(!close.is_good_distance);
    }

    #[test]
    fn test_threshold_boundaries() {
        let estimator = PoseEstimator::default();
        assert_eq!(estimator.classify_position(0.7), Position::Center);
        assert_eq!(estimator.classify_position(-0.7), Position::Center);
        assert_eq!(estimator.classify_position(0.700_001), Position::Right);
        assert_eq!(estimator.classify_position(-0.700_001), Position::Left);

        assert_eq!(estimator.classify_distance(0.25), DistanceStatus::Good);
        assert_eq!(estimator.classify_distance(0.45), DistanceStatus::Good);
        assert_eq!(estimator.classify_distance(0.249_999), DistanceStatus::TooFar);
        assert_eq!(estimator.classify_distance(0.450_001), DistanceStatus::TooClose);

        assert!(!estimator.is_level(15.0));
        assert!(!estimator.is_level(-15.0));
        assert!(estimator.is_level(14.999));
        assert!(estimator.is_level(-14.999));
    }

    #[test]
    fn test_tilted_eyes() {
        let mut landmarks = synthetic_face(1.0);
        let rise = 0.2 * 20.0_f64.to_radians().tan();
        landmarks[RIGHT_EYE].y = landmarks[LEFT_EYE].y + rise;
        let result = estimate_pose(&landmarks, 1280.0, 720.0).unwrap();
        assert!((result.tilt_angle - 20.0).abs() < 1e-6);
        assert!(!result.is_level);
    }

    #[test]
    fn test_missing_required_landmark() {
        for (idx, name) in REQUIRED_LANDMARKS {
            let mut landmarks = synthetic_face(1.0);
            landmarks[idx] = Landmark::new(f64::NAN, f64::NAN, f64::NAN);
            match estimate_pose(&landmarks, 1280.0, 720.0) {
                Err(Error::MissingLandmarks(names)) => assert_eq!(names, vec![name]),
                other => panic!("expected MissingLandmarks for {name}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_truncated_landmarks() {
        let landmarks = synthetic_face(1.0);
        match estimate_pose(&landmarks[..100], 1280.0, 720.0) {
            Err(Error::MissingLandmarks(names)) => {
                assert_eq!(names, vec!["nose bridge", "right eye", "bottom chin"]);
            }
            other => panic!("expected MissingLandmarks, got {other:?}"),
        }

        // Required points present, cheeks out of range
        assert!(matches!(
            estimate_pose(&landmarks[..300], 1280.0, 720.0),
            Err(Error::PoseComputation(_))
        ));
    }

    #[test]
    fn test_degenerate_normal() {
        let mut landmarks = synthetic_face(1.0);
        // Nose line parallel to the eye line
        landmarks[NOSE_BRIDGE] = Landmark::new(0.45, 0.4, 0.0);
        landmarks[NOSE_TIP] = Landmark::new(0.55, 0.4, 0.0);
        assert!(matches!(
            estimate_pose(&landmarks, 1280.0, 720.0),
            Err(Error::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn test_coincident_points_report_zero_normal() {
        let landmarks = vec![Landmark::new(0.5, 0.5, 0.0); NUM_FACE_MESH_LANDMARKS];
        match estimate_pose(&landmarks, 1280.0, 720.0) {
            Err(Error::DegenerateGeometry(msg)) => assert!(msg.contains("zero length"), "{msg}"),
            other => panic!("expected DegenerateGeometry, got {other:?}"),
        }
    }

    #[test]
    fn test_mirrored_bounding_box() {
        let mut landmarks = synthetic_face(1.0);
        landmarks[0] = Landmark::new(0.2, 0.1, 0.0);
        landmarks[2] = Landmark::new(0.8, 0.9, 0.0);

        let mirrored = estimate_pose(&landmarks, 1280.0, 720.0).unwrap();
        assert!((mirrored.bounding_box.left - 256.0).abs() < 1e-6);
        assert!((mirrored.bounding_box.width - 768.0).abs() < 1e-6);
        assert!((mirrored.bounding_box.top - 72.0).abs() < 1e-6);
        assert!((mirrored.bounding_box.height - 576.0).abs() < 1e-6);

        let raw = PoseEstimator::new(PoseThresholds::default(), false)
            .estimate(&landmarks, 1280.0, 720.0)
            .unwrap();
        assert!((raw.bounding_box.left - 256.0).abs() < 1e-6);
    }

    #[test]
    fn test_display_x_follows_mirroring() {
        let mut landmarks = synthetic_face(1.0);
        for landmark in &mut landmarks {
            landmark.x -= 0.2;
        }
        let mirrored = estimate_pose(&landmarks, 1280.0, 720.0).unwrap();
        assert!((mirrored.normalized_x - 0.3).abs() < 1e-9);
        assert!((mirrored.display_x - 0.7).abs() < 1e-9);

        let raw = PoseEstimator::new(PoseThresholds::default(), false)
            .estimate(&landmarks, 1280.0, 720.0)
            .unwrap();
        assert!((raw.display_x - 0.3).abs() < 1e-9);
        assert!((raw.bounding_box.left - 0.1 * 1280.0).abs() < 1e-6);
        assert!((mirrored.bounding_box.left - (1280.0 - 0.5 * 1280.0)).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_frame_size() {
        let landmarks = synthetic_face(1.0);
        assert!(matches!(estimate_pose(&landmarks, 0.0, 720.0), Err(Error::InvalidInput(_))));
        assert!(matches!(estimate_pose(&landmarks, 1280.0, f64::NAN), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_idempotent() {
        let landmarks = synthetic_face(0.9);
        let first = estimate_pose(&landmarks, 640.0, 480.0).unwrap();
        let second = estimate_pose(&landmarks, 640.0, 480.0).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.tilt_angle.to_bits(), second.tilt_angle.to_bits());
    }
}
