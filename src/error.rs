//! Error types for the head pose guide library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// `ONNX` Runtime inference failed
    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(#[from] ort::OrtError),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required external component (model file, runtime) is not available
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// Camera or model failed to start
    #[error("Initialization failed: {0}")]
    InitializationFailure(String),

    /// No landmarks are cached for the current frame
    #[error("No face detected")]
    NoFaceDetected,

    /// Required landmarks are absent from an otherwise present detection
    #[error("Missing landmarks: {}", .0.join(", "))]
    MissingLandmarks(Vec<&'static str>),

    /// Face normal has zero length
    #[error("Degenerate face geometry: {0}")]
    DegenerateGeometry(String),

    /// Any other failure while computing the pose
    #[error("Pose computation failed: {0}")]
    PoseComputation(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model input configuration error
    #[error("Model input error: {0}")]
    ModelInputError(String),

    /// Model output processing error
    #[error("Model output error: {0}")]
    ModelOutputError(String),

    /// Provider lifecycle misuse (start while running, worker crash)
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Errors a caller should answer by polling again rather than tearing down
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NoFaceDetected | Self::MissingLandmarks(_) | Self::DegenerateGeometry(_) | Self::PoseComputation(_)
        )
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_face_message() {
        assert_eq!(Error::NoFaceDetected.to_string(), crate::constants::NO_FACE_DETECTED);
    }

    #[test]
    fn test_missing_landmarks_lists_names() {
        let err = Error::MissingLandmarks(vec!["nose tip", "bottom chin"]);
        assert_eq!(err.to_string(), "Missing landmarks: nose tip, bottom chin");
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::NoFaceDetected.is_transient());
        assert!(Error::DegenerateGeometry("zero normal".into()).is_transient());
        assert!(Error::PoseComputation("nan".into()).is_transient());
        assert!(!Error::MissingDependency("model".into()).is_transient());
        assert!(!Error::InitializationFailure("camera".into()).is_transient());
    }
}
