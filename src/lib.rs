//! Head pose guide library for real-time face framing feedback.
//!
//! This library tells a user, from a live camera, whether their face is
//! turned left or right, too near or too far, and whether the head is level.
//! It is built from:
//! - An SCRFD face detector and a face mesh model on ONNX Runtime producing
//!   468 facial landmarks
//! - `OpenCV` for capture and the optional debug window
//! - A pure geometric [`PoseEstimator`] turning landmarks into a [`PoseResult`]
//!
//! The pipeline consists of:
//! 1. Continuous frame capture on a background thread
//! 2. Landmark detection with at most one frame in flight (latest wins)
//! 3. On-demand pose estimation from the most recent landmarks
//!
//! # Examples
//!
//! ## Polling a Session
//!
//! ```no_run
//! use head_pose_guide::{config::Config, provider::StartOptions, FaceGuideSession};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let mut session = FaceGuideSession::new(&config)?;
//! session.start(StartOptions { debug: false })?;
//!
//! for _ in 0..50 {
//!     match session.detect_face() {
//!         Ok(pose) => println!("{} / {} / level: {}", pose.position, pose.distance_status, pose.is_level),
//!         Err(e) => println!("{}", e),
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//!
//! session.dispose();
//! # Ok(())
//! # }
//! ```
//!
//! ## Estimating Pose from Landmarks
//!
//! ```
//! use head_pose_guide::{constants::landmark_index::*, landmarks::Landmark, Position, PoseEstimator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 468 normalized landmarks from any face mesh detector, here a frontal face
//! let mut landmarks = vec![Landmark::new(0.5, 0.5, 0.0); 468];
//! landmarks[LEFT_EYE] = Landmark::new(0.4, 0.4, 0.0);
//! landmarks[RIGHT_EYE] = Landmark::new(0.6, 0.4, 0.0);
//! landmarks[NOSE_BRIDGE] = Landmark::new(0.5, 0.4, 0.0);
//! landmarks[NOSE_TIP] = Landmark::new(0.5, 0.5, -0.05);
//! landmarks[TOP_FOREHEAD] = Landmark::new(0.5, 0.2, 0.0);
//! landmarks[BOTTOM_CHIN] = Landmark::new(0.5, 0.8, 0.0);
//! landmarks[LEFT_CHEEK] = Landmark::new(0.3, 0.5, 0.0);
//! landmarks[RIGHT_CHEEK] = Landmark::new(0.7, 0.5, 0.0);
//! let estimator = PoseEstimator::default();
//!
//! let pose = estimator.estimate(&landmarks, 1280.0, 720.0)?;
//! assert_eq!(pose.position, Position::Center);
//! assert!(pose.is_level);
//! println!("Tilt: {:.1} degrees, box: {:?}", pose.tilt_angle, pose.bounding_box);
//! # Ok(())
//! # }
//! ```

/// Constants used throughout the library
pub mod constants;

/// Error types and result handling
pub mod error;

/// Face mesh landmark points and frames
pub mod landmarks;

/// Geometric head pose estimation from face mesh landmarks
pub mod pose_estimation;

/// Landmark providers: capture, detection and the latest-wins cache
pub mod provider;

/// Caller-facing session
pub mod session;

/// Debug overlay window
pub mod overlay;

/// Configuration management
pub mod config;

/// Utility functions for numeric conversions
pub mod utils;

pub use error::{Error, Result};
pub use landmarks::{Landmark, LandmarkFrame};
pub use pose_estimation::{estimate_pose, BoundingBox, DistanceStatus, Position, PoseEstimator, PoseResult, PoseThresholds};
pub use session::FaceGuideSession;
