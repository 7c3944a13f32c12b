//! Constants used throughout the crate

/// Number of points in the face mesh topology
pub const NUM_FACE_MESH_LANDMARKS: usize = 468;

/// Number of points when the model also emits the refined iris landmarks
pub const NUM_REFINED_LANDMARKS: usize = 478;

/// Coordinates per landmark (x, y, z)
pub const LANDMARK_DIMENSIONS: usize = 3;

/// Face mesh landmark indices consumed by the pose estimator
pub mod landmark_index {
    pub const NOSE_TIP: usize = 1;
    pub const NOSE_BRIDGE: usize = 168;
    pub const LEFT_EYE: usize = 33;
    pub const RIGHT_EYE: usize = 263;
    pub const LEFT_CHEEK: usize = 234;
    pub const RIGHT_CHEEK: usize = 454;
    pub const TOP_FOREHEAD: usize = 10;
    pub const BOTTOM_CHIN: usize = 152;
    /// Jaw and cheek share the same mesh points
    pub const LEFT_JAW: usize = LEFT_CHEEK;
    pub const RIGHT_JAW: usize = RIGHT_CHEEK;
}

/// |side projection| above this turns the head left or right
pub const DEFAULT_SIDE_THRESHOLD: f64 = 0.7;

/// Weighted face size below this is too far from the camera
pub const DEFAULT_TOO_FAR_THRESHOLD: f64 = 0.25;

/// Weighted face size above this is too close to the camera
pub const DEFAULT_TOO_CLOSE_THRESHOLD: f64 = 0.45;

/// Maximum |tilt| in degrees still considered level (exclusive)
pub const DEFAULT_LEVEL_TOLERANCE_DEG: f64 = 15.0;

/// Weights of the distance heuristic
pub const FACE_HEIGHT_WEIGHT: f64 = 0.4;
pub const EYE_DISTANCE_WEIGHT: f64 = 0.3;
pub const JAW_WIDTH_WEIGHT: f64 = 0.3;

/// Default capture resolution
pub const DEFAULT_FRAME_WIDTH: u32 = 1280;
pub const DEFAULT_FRAME_HEIGHT: u32 = 720;

/// Default face mesh model input size
pub const DEFAULT_MESH_INPUT_SIZE: i32 = 192;

/// Default detection / tracking confidences
pub const DEFAULT_DETECTION_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_TRACKING_CONFIDENCE: f32 = 0.5;

/// Default IoU threshold of the face detector's non-maximum suppression
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.4;

/// Margin added on every side of the face box, as a share of its larger side
pub const FACE_CROP_MARGIN: f64 = 0.25;

/// Default polling interval of the CLI in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Message reported when no landmarks are cached
pub const NO_FACE_DETECTED: &str = "No face detected";

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;
