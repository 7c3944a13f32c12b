//! SCRFD face detector placing the first mesh crop.

use crate::{
    utils::safe_cast::{f64_to_i32_clamp, u32_to_i32, usize_to_i32},
    Error, Result,
};
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Rect, Scalar, Size, CV_32F};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Environment, Session, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Default SCRFD input side
const DEFAULT_DETECTOR_INPUT: i32 = 640;

/// Face detection result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceDetection {
    /// Bounding box in frame pixels
    pub bbox: Rect,
    /// Confidence score of the detection
    pub score: f32,
}

/// Candidate box in frame pixels before suppression
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    score: f32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

/// SCRFD face detector locating the face the mesh model is run on
pub struct FaceDetector {
    session: Session,
    input_size: (i32, i32),
    conf_threshold: f32,
    nms_threshold: f32,
    num_anchors: usize,
    strides: Vec<i32>,
    offset: usize,
    center_cache: HashMap<(i32, i32, i32), Vec<(f32, f32)>>,
}

impl FaceDetector {
    /// Load an SCRFD model
    ///
    /// # Errors
    ///
    /// Returns `MissingDependency` if the model file does not exist, or an
    /// ONNX Runtime error if it cannot be loaded.
    pub fn new<P: AsRef<Path>>(model_path: P, conf_threshold: f32, nms_threshold: f32) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(Error::MissingDependency(format!(
                "Face detector model not found: {}",
                model_path.display()
            )));
        }

        log::info!("Initializing FaceDetector with model: {}", model_path.display());
        let environment = Arc::new(
            Environment::builder()
                .with_name("face_detector")
                .with_log_level(ort::LoggingLevel::Warning)
                .build()?,
        );

        let session = ort::SessionBuilder::new(&environment)?
            .with_optimization_level(ort::GraphOptimizationLevel::Level3)?
            .with_model_from_file(model_path)?;

        // [batch, channels, height, width]
        let input = session
            .inputs
            .first()
            .ok_or_else(|| Error::ModelInputError("Detector has no inputs".to_string()))?;
        let input_size = match input.dimensions.as_slice() {
            [_, _, Some(height), Some(width)] => (u32_to_i32(*width)?, u32_to_i32(*height)?),
            _ => (DEFAULT_DETECTOR_INPUT, DEFAULT_DETECTOR_INPUT),
        };

        // Output count tells the anchor layout: scores, boxes and optional keypoints per stride
        let (offset, strides, num_anchors) = match session.outputs.len() {
            6 | 9 => (3, vec![8, 16, 32], 2),
            10 | 15 => (5, vec![8, 16, 32, 64, 128], 1),
            n => {
                log::warn!("Unknown detector layout with {} outputs, assuming 3 strides", n);
                (3, vec![8, 16, 32], 2)
            }
        };

        Ok(Self {
            session,
            input_size,
            conf_threshold,
            nms_threshold,
            num_anchors,
            strides,
            offset,
            center_cache: HashMap::new(),
        })
    }

    /// Detect faces, best score first
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails.
    #[allow(clippy::cast_precision_loss)] // pixel sizes are far below f32 precision
    pub fn detect(&mut self, image: &Mat) -> Result<Vec<FaceDetection>> {
        let (img_width, img_height) = (image.cols(), image.rows());
        if img_width <= 0 || img_height <= 0 {
            return Err(Error::InvalidInput("Empty frame".to_string()));
        }

        // Letterbox into the model input, keeping the aspect ratio
        let (input_width, input_height) = self.input_size;
        let ratio_img = f64::from(img_height) / f64::from(img_width);
        let ratio_model = f64::from(input_height) / f64::from(input_width);
        let (new_width, new_height) = if ratio_img > ratio_model {
            (f64_to_i32_clamp(f64::from(input_height) / ratio_img, 1, input_width), input_height)
        } else {
            (input_width, f64_to_i32_clamp(f64::from(input_width) * ratio_img, 1, input_height))
        };
        let det_scale = new_height as f32 / img_height as f32;

        let mut resized = Mat::default();
        imgproc::resize(
            image,
            &mut resized,
            Size::new(new_width, new_height),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut det_img =
            Mat::new_rows_cols_with_default(input_height, input_width, opencv::core::CV_8UC3, Scalar::all(0.0))?;
        {
            let mut roi = det_img.roi_mut(Rect::new(0, 0, new_width, new_height))?;
            resized.copy_to(&mut roi)?;
        }

        let inputs = self.preprocess(&det_img)?;
        let outputs = self.forward(inputs)?;

        let mut candidates = Vec::new();
        for (idx, &stride) in self.strides.clone().iter().enumerate() {
            let scores = output(&outputs, idx)?;
            let distances = output(&outputs, idx + self.offset)?;
            let centers = self.anchor_centers(input_height / stride, input_width / stride, stride);

            if scores.len() > centers.len() || distances.len() < scores.len() * 4 {
                return Err(Error::ModelOutputError(format!(
                    "Stride {stride}: {} scores for {} anchors and {} box values",
                    scores.len(),
                    centers.len(),
                    distances.len()
                )));
            }

            let stride = stride as f32;
            for (i, &score) in scores.iter().enumerate() {
                if score < self.conf_threshold {
                    continue;
                }
                let (cx, cy) = centers[i];
                let d = &distances[i * 4..i * 4 + 4];
                candidates.push(Candidate {
                    score,
                    x1: (cx - d[0] * stride) / det_scale,
                    y1: (cy - d[1] * stride) / det_scale,
                    x2: (cx + d[2] * stride) / det_scale,
                    y2: (cy + d[3] * stride) / det_scale,
                });
            }
        }

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        let detections = nms(&candidates, self.nms_threshold)
            .into_iter()
            .map(|c| FaceDetection {
                bbox: Rect::new(
                    f64_to_i32_clamp(f64::from(c.x1), 0, img_width),
                    f64_to_i32_clamp(f64::from(c.y1), 0, img_height),
                    f64_to_i32_clamp(f64::from(c.x2 - c.x1), 0, img_width),
                    f64_to_i32_clamp(f64::from(c.y2 - c.y1), 0, img_height),
                ),
                score: c.score,
            })
            .collect::<Vec<_>>();

        log::debug!("Face detector found {} face(s)", detections.len());
        Ok(detections)
    }

    /// BGR to RGB, `(x - 127.5) / 128`, NCHW
    #[allow(clippy::cast_sign_loss)] // Mat sizes are non-negative
    fn preprocess(&self, image: &Mat) -> Result<Array4<f32>> {
        let mut rgb_image = Mat::default();
        imgproc::cvt_color(image, &mut rgb_image, imgproc::COLOR_BGR2RGB, 0)?;

        let mut float_image = Mat::default();
        rgb_image.convert_to(&mut float_image, CV_32F, 1.0 / 128.0, -127.5 / 128.0)?;

        let height = float_image.rows() as usize;
        let width = float_image.cols() as usize;
        let channels = 3;

        let mut data = vec![0.0f32; channels * height * width];
        for row in 0..height {
            for col in 0..width {
                let pixel = float_image.at_2d::<opencv::core::Vec3f>(usize_to_i32(row)?, usize_to_i32(col)?)?;
                for ch in 0..channels {
                    data[(ch * height + row) * width + col] = pixel[ch];
                }
            }
        }

        Array4::from_shape_vec((1, channels, height, width), data)
            .map_err(|e| Error::ModelInputError(format!("Failed to create array: {e}")))
    }

    fn forward(&self, inputs: Array4<f32>) -> Result<Vec<Vec<f32>>> {
        let cow_array = CowArray::from(inputs.into_dyn());
        let input_tensor = Value::from_array(self.session.allocator(), &cow_array)?;

        let outputs = self.session.run(vec![input_tensor])?;
        outputs
            .iter()
            .map(|output| -> Result<Vec<f32>> {
                let tensor = output.try_extract::<f32>()?;
                let values: Vec<f32> = tensor.view().iter().copied().collect();
                Ok(values)
            })
            .collect()
    }

    fn anchor_centers(&mut self, height: i32, width: i32, stride: i32) -> Vec<(f32, f32)> {
        let num_anchors = self.num_anchors;
        self.center_cache
            .entry((height, width, stride))
            .or_insert_with(|| anchor_centers(height, width, stride, num_anchors))
            .clone()
    }
}

fn output(outputs: &[Vec<f32>], idx: usize) -> Result<&[f32]> {
    outputs
        .get(idx)
        .map(Vec::as_slice)
        .ok_or_else(|| Error::ModelOutputError(format!("Detector output {idx} is missing")))
}

/// Anchor centres of one stride, row-major, each repeated `num_anchors` times
#[allow(clippy::cast_precision_loss)]
fn anchor_centers(height: i32, width: i32, stride: i32, num_anchors: usize) -> Vec<(f32, f32)> {
    let mut centers = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let center = ((x * stride) as f32, (y * stride) as f32);
            centers.extend(std::iter::repeat(center).take(num_anchors.max(1)));
        }
    }
    centers
}

/// Greedy non-maximum suppression over candidates sorted by score
fn nms(candidates: &[Candidate], threshold: f32) -> Vec<Candidate> {
    let area = |c: &Candidate| (c.x2 - c.x1 + 1.0) * (c.y2 - c.y1 + 1.0);
    let mut keep: Vec<Candidate> = Vec::new();

    for candidate in candidates {
        let suppressed = keep.iter().any(|kept| {
            let w = (candidate.x2.min(kept.x2) - candidate.x1.max(kept.x1) + 1.0).max(0.0);
            let h = (candidate.y2.min(kept.y2) - candidate.y1.max(kept.y1) + 1.0).max(0.0);
            let inter = w * h;
            inter / (area(candidate) + area(kept) - inter) > threshold
        });
        if !suppressed {
            keep.push(*candidate);
        }
    }
    keep
}
