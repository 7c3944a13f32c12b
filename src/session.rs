//! Caller-owned session: provider lifecycle plus the polling pose accessor.

use crate::{
    config::Config,
    overlay::DebugOverlay,
    pose_estimation::{PoseEstimator, PoseResult},
    provider::{
        camera::CameraSource, face_mesh::FaceMeshModel, gate::StatsSnapshot, CaptureProvider, FrameObserver,
        LandmarkProvider, StartOptions,
    },
    Error, Result,
};
use log::{debug, info, warn};
use opencv::core::Mat;

/// Face framing session
///
/// Owns a [`LandmarkProvider`] and turns its latest landmarks into a
/// [`PoseResult`] on demand. `detect_face` never waits for detection; it
/// reads whatever the provider completed last.
pub struct FaceGuideSession {
    provider: Box<dyn LandmarkProvider>,
    estimator: PoseEstimator,
    disposed: bool,
}

impl FaceGuideSession {
    /// Create a session capturing from the configured camera with the
    /// configured face mesh model. Nothing is opened until `start`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the configuration is invalid.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let camera = config.camera.clone();
        let model = config.model.clone();
        let window_name = config.display.window_name.clone();
        let estimator = config.pose_estimator();

        let provider = CaptureProvider::new(
            move || CameraSource::open(&camera.video_source(), camera.width, camera.height),
            move || FaceMeshModel::new(&model),
        )
        .with_debug_observer(move || {
            Ok(Box::new(DebugOverlay::new(&window_name, estimator)) as Box<dyn FrameObserver<Mat>>)
        });

        Ok(Self::with_provider(Box::new(provider), estimator))
    }

    /// Create a session around any provider
    #[must_use]
    pub fn with_provider(provider: Box<dyn LandmarkProvider>, estimator: PoseEstimator) -> Self {
        Self {
            provider,
            estimator,
            disposed: false,
        }
    }

    /// Start capture and detection
    ///
    /// # Errors
    ///
    /// Returns `MissingDependency` when the model is unavailable,
    /// `InitializationFailure` when the camera or model fails to start, and
    /// `ProviderError` on a disposed or already running session.
    pub fn start(&mut self, options: StartOptions) -> Result<()> {
        if self.disposed {
            return Err(Error::ProviderError("Session has been disposed".to_string()));
        }
        self.provider.start(options)?;
        info!("Face guide session started");
        Ok(())
    }

    /// Callback form of [`start`](Self::start): `callback(success, error_message)`
    pub fn init<F>(&mut self, options: StartOptions, callback: F)
    where
        F: FnOnce(bool, Option<String>),
    {
        match self.start(options) {
            Ok(()) => callback(true, None),
            Err(e) => {
                warn!("Face guide initialization failed: {}", e);
                callback(false, Some(e.to_string()));
            }
        }
    }

    /// Stop capture; the session can be started again
    pub fn stop(&mut self) {
        self.provider.stop();
    }

    /// Stop capture and release everything. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.provider.stop();
        self.disposed = true;
        info!("Face guide session disposed");
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.disposed && self.provider.is_running()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[must_use]
    pub fn estimator(&self) -> &PoseEstimator {
        &self.estimator
    }

    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.provider.stats()
    }

    /// Pose of the most recently detected face
    ///
    /// # Errors
    ///
    /// Returns `NoFaceDetected` when nothing is cached, otherwise any
    /// error of [`PoseEstimator::estimate`]. None of them are fatal.
    pub fn detect_face(&self) -> Result<PoseResult> {
        let frame = self.provider.latest().ok_or(Error::NoFaceDetected)?;
        self.estimator
            .estimate(&frame.landmarks, f64::from(frame.width), f64::from(frame.height))
            .map_err(|e| {
                debug!("Pose unavailable for frame {}: {}", frame.sequence, e);
                e
            })
    }

    /// Callback form of [`detect_face`](Self::detect_face):
    /// `callback(result, error_message)`
    pub fn detect_face_with<F>(&self, callback: F)
    where
        F: FnOnce(Option<PoseResult>, Option<String>),
    {
        match self.detect_face() {
            Ok(pose) => callback(Some(pose), None),
            Err(e) => callback(None, Some(e.to_string())),
        }
    }
}

impl Drop for FaceGuideSession {
    fn drop(&mut self) {
        self.dispose();
    }
}
