//! Configuration management for the head pose guide

use crate::{
    constants::{
        DEFAULT_DETECTION_CONFIDENCE, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH, DEFAULT_NMS_THRESHOLD,
        DEFAULT_POLL_INTERVAL_MS, DEFAULT_TRACKING_CONFIDENCE,
    },
    pose_estimation::{PoseEstimator, PoseThresholds},
    provider::camera::VideoSource,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Video input configuration
    pub camera: CameraConfig,

    /// Face mesh model configuration
    pub model: ModelConfig,

    /// Pose classification thresholds
    pub pose: PoseThresholds,

    /// Display configuration
    pub display: DisplayConfig,

    /// Polling configuration of the command line client
    pub poll: PollConfig,
}

/// Video input configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Webcam index, used when no video file is set
    pub index: i32,

    /// Video file to read instead of a webcam
    pub video_file: Option<PathBuf>,

    /// Requested capture width
    pub width: u32,

    /// Requested capture height
    pub height: u32,
}

/// Face mesh model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the face mesh ONNX model
    pub face_mesh: PathBuf,

    /// Path to the SCRFD face detector ONNX model used to find the face
    /// before tracking starts
    pub face_detector: PathBuf,

    /// IoU above which overlapping detector boxes are merged
    pub nms_threshold: f32,

    /// Maximum number of tracked faces (the mesh model tracks one)
    pub max_faces: usize,

    /// Face presence confidence required to start tracking (0.0-1.0)
    pub min_detection_confidence: f32,

    /// Face presence confidence required to keep tracking (0.0-1.0)
    pub min_tracking_confidence: f32,

    /// Keep the iris landmarks of a refined (478-point) model
    pub refine_landmarks: bool,
}

/// Display configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// The preview is shown horizontally flipped
    pub mirrored: bool,

    /// Show the debug overlay window
    pub debug_overlay: bool,

    /// Debug overlay window title
    pub window_name: String,
}

/// Polling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay between two `detect_face` calls
    pub interval_ms: u64,

    /// Stop after this many polls
    pub max_polls: Option<u64>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            video_file: None,
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            face_mesh: PathBuf::from("assets/face_mesh.onnx"),
            face_detector: PathBuf::from("assets/face_detector.onnx"),
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            max_faces: 1,
            min_detection_confidence: DEFAULT_DETECTION_CONFIDENCE,
            min_tracking_confidence: DEFAULT_TRACKING_CONFIDENCE,
            refine_landmarks: false,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mirrored: true,
            debug_overlay: false,
            window_name: "Head Pose Guide".to_string(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_polls: None,
        }
    }
}

impl CameraConfig {
    /// Video file if configured, webcam otherwise
    #[must_use]
    pub fn video_source(&self) -> VideoSource {
        match &self.video_file {
            Some(path) => VideoSource::File(path.display().to_string()),
            None => VideoSource::Camera(self.index),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Pose estimator for these thresholds and display mirroring
    #[must_use]
    pub fn pose_estimator(&self) -> PoseEstimator {
        PoseEstimator::new(self.pose, self.display.mirrored)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        // Validate camera settings
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::ConfigError(
                "Capture width and height must be greater than 0".to_string(),
            ));
        }

        // Validate model settings
        if self.model.max_faces != 1 {
            return Err(Error::ConfigError(format!(
                "Only one tracked face is supported, got max_faces = {}",
                self.model.max_faces
            )));
        }
        if !(0.0..=1.0).contains(&self.model.min_detection_confidence) {
            return Err(Error::ConfigError(
                "Detection confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.model.min_tracking_confidence) {
            return Err(Error::ConfigError(
                "Tracking confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.model.nms_threshold) {
            return Err(Error::ConfigError(
                "NMS threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        // Validate pose thresholds
        if !(0.0..=1.0).contains(&self.pose.side_threshold) {
            return Err(Error::ConfigError(
                "Side threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(self.pose.too_far >= 0.0 && self.pose.too_far <= self.pose.too_close) {
            return Err(Error::ConfigError(
                "Distance thresholds must satisfy 0 <= too_far <= too_close".to_string(),
            ));
        }
        if !(self.pose.level_tolerance_deg > 0.0 && self.pose.level_tolerance_deg <= 180.0) {
            return Err(Error::ConfigError(
                "Level tolerance must be in (0, 180] degrees".to_string(),
            ));
        }
        let weights = [
            self.pose.face_height_weight,
            self.pose.eye_distance_weight,
            self.pose.jaw_width_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::ConfigError(
                "Distance weights must be finite and non-negative".to_string(),
            ));
        }

        // Validate polling
        if self.poll.interval_ms == 0 {
            return Err(Error::ConfigError("Poll interval must be greater than 0".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Head Pose Guide Configuration

# Video input
camera:
  index: 0
  width: 1280
  height: 720

# Face detector and mesh models
model:
  face_mesh: "assets/face_mesh.onnx"
  face_detector: "assets/face_detector.onnx"
  nms_threshold: 0.4
  max_faces: 1
  min_detection_confidence: 0.5
  min_tracking_confidence: 0.5
  refine_landmarks: false

# Pose classification
pose:
  side_threshold: 0.7
  too_far: 0.25
  too_close: 0.45
  level_tolerance_deg: 15.0
  face_height_weight: 0.4
  eye_distance_weight: 0.3
  jaw_width_weight: 0.3

# Display settings
display:
  mirrored: true
  debug_overlay: false
  window_name: "Head Pose Guide"

# Polling
poll:
  interval_ms: 100
"#;
