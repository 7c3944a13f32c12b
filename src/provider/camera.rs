use super::{FrameSource, VideoFrame};
use crate::{utils::safe_cast::dimension_to_u32, Error, Result};
use log::{info, warn};
use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Video source type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoSource {
    /// Webcam index
    Camera(i32),
    /// Video file path
    File(String),
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera(index) => write!(f, "camera {index}"),
            Self::File(path) => write!(f, "video file {path}"),
        }
    }
}

impl VideoFrame for Mat {
    fn dimensions(&self) -> (u32, u32) {
        (dimension_to_u32(self.cols()), dimension_to_u32(self.rows()))
    }
}

/// Frame source backed by `OpenCV` `VideoCapture`
pub struct CameraSource {
    capture: VideoCapture,
    source: VideoSource,
}

impl CameraSource {
    /// Open a camera or video file.
    ///
    /// The requested resolution is a hint; the device may pick another one.
    ///
    /// # Errors
    ///
    /// Returns `InitializationFailure` if the video file does not exist or
    /// the device cannot be opened.
    pub fn open(source: &VideoSource, width: u32, height: u32) -> Result<Self> {
        let capture = match source {
            VideoSource::Camera(index) => {
                info!("Opening camera {} at {}x{}", index, width, height);
                let mut cap = VideoCapture::new(*index, videoio::CAP_ANY)?;
                cap.set(CAP_PROP_FRAME_WIDTH, f64::from(width))?;
                cap.set(CAP_PROP_FRAME_HEIGHT, f64::from(height))?;

                // Reduce buffer size for lower latency (webcam only)
                cap.set(CAP_PROP_BUFFERSIZE, 1.0)?;
                cap
            }
            VideoSource::File(path) => {
                if !Path::new(path).exists() {
                    return Err(Error::InitializationFailure(format!("Video file not found: {path}")));
                }
                info!("Opening video file: {}", path);
                VideoCapture::from_file(path, videoio::CAP_ANY)?
            }
        };

        if !capture.is_opened()? {
            return Err(Error::InitializationFailure(format!("Failed to open {source}")));
        }

        info!(
            "Capturing {} at {}x{}",
            source,
            capture.get(CAP_PROP_FRAME_WIDTH)?,
            capture.get(CAP_PROP_FRAME_HEIGHT)?
        );

        Ok(Self {
            capture,
            source: source.clone(),
        })
    }

    #[must_use]
    pub fn source(&self) -> &VideoSource {
        &self.source
    }
}

impl FrameSource for CameraSource {
    type Frame = Mat;

    fn next_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if self.capture.read(&mut frame)? && !frame.empty() {
            return Ok(Some(frame));
        }

        match self.source {
            VideoSource::File(_) => {
                info!("End of video file reached");
                Ok(None)
            }
            VideoSource::Camera(_) => Err(Error::InvalidInput("Camera returned an empty frame".to_string())),
        }
    }

    fn release(&mut self) -> Result<()> {
        if self.capture.is_opened()? {
            self.capture.release()?;
            info!("Released {}", self.source);
        } else {
            warn!("{} was already closed", self.source);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_video_file() {
        let source = VideoSource::File("does/not/exist.mp4".to_string());
        assert!(matches!(
            CameraSource::open(&source, 1280, 720),
            Err(Error::InitializationFailure(_))
        ));
    }

    #[test]
    fn test_mat_dimensions() {
        let frame = Mat::zeros(480, 640, opencv::core::CV_8UC3).unwrap().to_mat().unwrap();
        assert_eq!(frame.dimensions(), (640, 480));
        assert_eq!(Mat::default().dimensions(), (0, 0));
    }

    #[test]
    fn test_video_source_display() {
        assert_eq!(VideoSource::Camera(0).to_string(), "camera 0");
        assert_eq!(VideoSource::File("a.mp4".into()).to_string(), "video file a.mp4");
    }
}
