use super::{face_detection::FaceDetector, region::FaceRegion, LandmarkModel};
use crate::{
    config::ModelConfig,
    constants::{
        DEFAULT_MESH_INPUT_SIZE, FACE_CROP_MARGIN, LANDMARK_DIMENSIONS, NUM_FACE_MESH_LANDMARKS,
        NUM_REFINED_LANDMARKS,
    },
    landmarks::Landmark,
    utils::safe_cast::{u32_to_i32, usize_to_i32},
    Error, Result,
};
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Size, CV_32F};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::path::Path;
use std::sync::Arc;

/// Face mesh landmark model running on `ONNX` Runtime
///
/// Expects a single-face mesh model taking a square RGB image in `[0, 1]`
/// and producing 468 (or 478 with iris refinement) `x, y, z` triples in
/// input pixels, optionally followed by a face presence logit.
///
/// The mesh runs on a square crop around the face. The face detector
/// places the first crop; after that each crop follows the previous
/// landmarks until the face is lost.
pub struct FaceMeshModel {
    detector: FaceDetector,
    session: Session,
    input_size: i32,
    channels_first: bool,
    min_detection_confidence: f32,
    min_tracking_confidence: f32,
    refine_landmarks: bool,
    region: Option<FaceRegion>,
}

impl FaceMeshModel {
    /// Load the face mesh model described by `config`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The mesh or detector model file does not exist (`MissingDependency`)
    /// - The ONNX runtime environment or session cannot be created
    /// - The model has no inputs
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let model_path: &Path = config.face_mesh.as_ref();
        if !model_path.exists() {
            return Err(Error::MissingDependency(format!(
                "Face mesh model not found: {}",
                model_path.display()
            )));
        }
        let detector = FaceDetector::new(
            &config.face_detector,
            config.min_detection_confidence,
            config.nms_threshold,
        )?;

        log::info!("Initializing FaceMeshModel with model: {}", model_path.display());
        let environment = Arc::new(
            Environment::builder()
                .with_name("face_mesh")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| Error::ModelInputError("Model has no inputs".to_string()))?;

        // [batch, 3, h, w] or [batch, h, w, 3]
        let (channels_first, input_size) = match input.dimensions.as_slice() {
            [_, Some(3), Some(side), _] => (true, u32_to_i32(*side)?),
            [_, Some(side), _, Some(3)] => (false, u32_to_i32(*side)?),
            dims => {
                log::warn!(
                    "Unrecognised input shape {:?}, assuming NHWC {}x{}",
                    dims,
                    DEFAULT_MESH_INPUT_SIZE,
                    DEFAULT_MESH_INPUT_SIZE
                );
                (false, DEFAULT_MESH_INPUT_SIZE)
            }
        };
        log::debug!(
            "Face mesh input '{}' {}x{} ({})",
            input.name,
            input_size,
            input_size,
            if channels_first { "NCHW" } else { "NHWC" }
        );

        Ok(Self {
            detector,
            session,
            input_size,
            channels_first,
            min_detection_confidence: config.min_detection_confidence,
            min_tracking_confidence: config.min_tracking_confidence,
            refine_landmarks: config.refine_landmarks,
            region: None,
        })
    }

    /// Resize, convert to RGB and scale to `[0, 1]`
    #[allow(clippy::cast_sign_loss)] // input size is positive
    fn preprocess(&self, image: &Mat) -> Result<Array4<f32>> {
        let size = self.input_size as usize;
        let channels = 3;

        let mut resized = Mat::default();
        imgproc::resize(
            image,
            &mut resized,
            Size::new(self.input_size, self.input_size),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut rgb_image = Mat::default();
        imgproc::cvt_color(&resized, &mut rgb_image, imgproc::COLOR_BGR2RGB, 0)?;

        let mut float_image = Mat::default();
        rgb_image.convert_to(&mut float_image, CV_32F, 1.0 / 255.0, 0.0)?;

        let mut data = vec![0.0f32; size * size * channels];
        for row in 0..size {
            for col in 0..size {
                let pixel = float_image.at_2d::<opencv::core::Vec3f>(usize_to_i32(row)?, usize_to_i32(col)?)?;
                for ch in 0..channels {
                    data[(row * size + col) * channels + ch] = pixel[ch];
                }
            }
        }

        let array = Array4::from_shape_vec((1, size, size, channels), data)
            .map_err(|e| Error::ModelInputError(format!("Failed to create array: {e}")))?;

        if self.channels_first {
            Ok(array.permuted_axes([0, 3, 1, 2]).as_standard_layout().into_owned())
        } else {
            Ok(array)
        }
    }

    /// Run the model, returning every output flattened
    fn forward(&self, inputs: Array4<f32>) -> Result<Vec<Vec<f32>>> {
        let cow_array = CowArray::from(inputs.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;
        if outputs.is_empty() {
            return Err(Error::ModelOutputError("No output from model".to_string()));
        }

        outputs
            .iter()
            .map(|output| -> Result<Vec<f32>> {
                let tensor = output.try_extract::<f32>()?;
                let values: Vec<f32> = tensor.view().iter().copied().collect();
                Ok(values)
            })
            .collect()
    }

    /// Tracked region, or a new one around the best detector box
    fn face_region(&mut self, frame: &Mat) -> Result<Option<FaceRegion>> {
        if let Some(region) = self.region {
            return Ok(Some(region));
        }
        let (width, height) = (frame.cols(), frame.rows());
        let region = self
            .detector
            .detect(frame)?
            .first()
            .and_then(|face| FaceRegion::from_rect(face.bbox, FACE_CROP_MARGIN, width, height));
        Ok(region)
    }

    /// Confidence threshold for the next frame
    fn threshold(&self) -> f32 {
        if self.region.is_some() {
            self.min_tracking_confidence
        } else {
            self.min_detection_confidence
        }
    }
}

impl LandmarkModel<Mat> for FaceMeshModel {
    fn detect(&mut self, frame: &Mat) -> Result<Option<Vec<Landmark>>> {
        if frame.empty() {
            return Err(Error::InvalidInput("Empty frame".to_string()));
        }
        let Some(region) = self.face_region(frame)? else {
            return Ok(None);
        };

        // Lose the track on failure so the next frame runs the detector
        let threshold = self.threshold();
        self.region = None;

        let crop = Mat::roi(frame, region.rect())?.try_clone()?;
        let input = self.preprocess(&crop)?;
        let outputs = self.forward(input)?;
        let (mesh, score) = split_outputs(outputs)?;

        let landmarks = decode_landmarks(&mesh, score, threshold, f64::from(self.input_size), self.refine_landmarks)?
            .map(|crop_landmarks| region.to_frame(&crop_landmarks, frame.cols(), frame.rows()));

        self.region = landmarks
            .as_deref()
            .and_then(|landmarks| FaceRegion::from_landmarks(landmarks, FACE_CROP_MARGIN, frame.cols(), frame.rows()));
        Ok(landmarks)
    }
}

/// Pick the landmark tensor (largest output) and the presence logit
/// (a single-element output), whatever order the model lists them in.
fn split_outputs(outputs: Vec<Vec<f32>>) -> Result<(Vec<f32>, Option<f32>)> {
    let mut mesh: Option<Vec<f32>> = None;
    let mut score = None;

    for values in outputs {
        if values.len() == 1 {
            score = values.first().copied();
        } else if mesh.as_ref().map_or(true, |m| values.len() > m.len()) {
            mesh = Some(values);
        }
    }

    let mesh = mesh.ok_or_else(|| Error::ModelOutputError("Model produced no landmark tensor".to_string()))?;
    Ok((mesh, score))
}

/// Decode a flat landmark tensor into normalized landmarks.
///
/// `score` is a raw logit; below `threshold` after the sigmoid the frame
/// is reported as having no face.
///
/// # Errors
///
/// Returns an error if the tensor holds fewer than 468 points.
pub fn decode_landmarks(
    values: &[f32],
    score: Option<f32>,
    threshold: f32,
    input_size: f64,
    refine_landmarks: bool,
) -> Result<Option<Vec<Landmark>>> {
    if let Some(logit) = score {
        let confidence = sigmoid(logit);
        if confidence < threshold {
            log::debug!("Face presence {:.3} below threshold {:.3}", confidence, threshold);
            return Ok(None);
        }
    }

    let points = values.len() / LANDMARK_DIMENSIONS;
    if points < NUM_FACE_MESH_LANDMARKS {
        return Err(Error::ModelOutputError(format!(
            "Expected at least {} landmarks, got {}",
            NUM_FACE_MESH_LANDMARKS, points
        )));
    }

    let keep = if refine_landmarks && points >= NUM_REFINED_LANDMARKS {
        NUM_REFINED_LANDMARKS
    } else {
        NUM_FACE_MESH_LANDMARKS
    };

    Ok(Some(Landmark::from_flat(&values[..keep * LANDMARK_DIMENSIONS], input_size)))
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
