//! Debug window showing the camera frame with the landmark mesh.

use crate::{
    landmarks::Landmark,
    pose_estimation::{PoseEstimator, PoseResult},
    provider::{FrameObserver, VideoFrame},
    utils::safe_cast::f64_to_i32_clamp,
    Result,
};
use opencv::{
    core::{Mat, Point, Rect, Scalar},
    highgui::{self, WINDOW_NORMAL},
    imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8},
    prelude::*,
};

/// Renders frames, landmarks and the pose summary to a `highgui` window.
///
/// The window is created on the first rendered frame, on the thread that
/// renders, and destroyed when the overlay is dropped.
pub struct DebugOverlay {
    window_name: String,
    estimator: PoseEstimator,
    window_open: bool,
}

impl DebugOverlay {
    #[must_use]
    pub fn new(window_name: &str, estimator: PoseEstimator) -> Self {
        Self {
            window_name: window_name.to_string(),
            estimator,
            window_open: false,
        }
    }

    /// Draw landmarks and pose text onto a copy of `frame`
    ///
    /// # Errors
    ///
    /// Returns an error if an `OpenCV` drawing call fails.
    pub fn render(&self, frame: &Mat, landmarks: Option<&[Landmark]>) -> Result<Mat> {
        let mut canvas = Mat::default();
        if self.estimator.is_mirrored() {
            opencv::core::flip(frame, &mut canvas, 1)?;
        } else {
            frame.copy_to(&mut canvas)?;
        }

        let (width, height) = frame.dimensions();
        let (width, height) = (f64::from(width), f64::from(height));

        let Some(landmarks) = landmarks else {
            self.put_line(&mut canvas, "No face detected", 0, Scalar::new(0.0, 0.0, 255.0, 0.0))?;
            return Ok(canvas);
        };

        for landmark in landmarks.iter().filter(|l| l.is_finite()) {
            let x = if self.estimator.is_mirrored() { 1.0 - landmark.x } else { landmark.x };
            imgproc::circle(
                &mut canvas,
                Point::new(self.to_pixel(x * width, width), self.to_pixel(landmark.y * height, height)),
                1,
                Scalar::new(255.0, 0.0, 0.0, 0.0),
                -1,
                LINE_8,
                0,
            )?;
        }

        match self.estimator.estimate(landmarks, width, height) {
            Ok(pose) => self.draw_pose(&mut canvas, &pose, width, height)?,
            Err(e) => self.put_line(&mut canvas, &e.to_string(), 0, Scalar::new(0.0, 0.0, 255.0, 0.0))?,
        }

        Ok(canvas)
    }

    fn draw_pose(&self, canvas: &mut Mat, pose: &PoseResult, width: f64, height: f64) -> Result<()> {
        let color = if pose.is_good_distance && pose.is_level {
            Scalar::new(0.0, 255.0, 0.0, 0.0)
        } else {
            Scalar::new(0.0, 255.0, 255.0, 0.0)
        };

        let bbox = pose.bounding_box;
        let left = self.to_pixel(bbox.left, width);
        let top = self.to_pixel(bbox.top, height);
        imgproc::rectangle(
            canvas,
            Rect::new(
                left,
                top,
                self.to_pixel(bbox.width, width - f64::from(left)),
                self.to_pixel(bbox.height, height - f64::from(top)),
            ),
            color,
            2,
            LINE_8,
            0,
        )?;

        self.put_line(canvas, &format!("Position: {}", pose.position), 0, color)?;
        self.put_line(
            canvas,
            &format!("Distance: {} ({:.3})", pose.distance_status, pose.weighted_size),
            1,
            color,
        )?;
        self.put_line(
            canvas,
            &format!("Tilt: {:.1} deg{}", pose.tilt_angle, if pose.is_level { "" } else { " (not level)" }),
            2,
            color,
        )?;
        Ok(())
    }

    fn put_line(&self, canvas: &mut Mat, text: &str, line: i32, color: Scalar) -> Result<()> {
        imgproc::put_text(
            canvas,
            text,
            Point::new(10, 30 + line * 30),
            FONT_HERSHEY_SIMPLEX,
            0.8,
            color,
            2,
            LINE_8,
            false,
        )?;
        Ok(())
    }

    fn to_pixel(&self, value: f64, limit: f64) -> i32 {
        f64_to_i32_clamp(value, 0, f64_to_i32_clamp(limit, 0, i32::MAX))
    }
}

impl FrameObserver<Mat> for DebugOverlay {
    fn observe(&mut self, frame: &Mat, landmarks: Option<&[Landmark]>) -> Result<()> {
        if !self.window_open {
            highgui::named_window(&self.window_name, WINDOW_NORMAL)?;
            self.window_open = true;
        }
        let canvas = self.render(frame, landmarks)?;
        highgui::imshow(&self.window_name, &canvas)?;
        highgui::wait_key(1)?;
        Ok(())
    }
}

impl Drop for DebugOverlay {
    fn drop(&mut self) {
        if self.window_open {
            if let Err(e) = highgui::destroy_window(&self.window_name) {
                log::warn!("Failed to close debug overlay: {}", e);
            }
        }
    }
}
