//! YOLO fire/smoke detection model

use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::frame::Frame;
use crate::models::detector::{Detection, Detector};
use crate::utils::letterbox;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, info};

/// YOLO detector backed by an ONNX Runtime session.
///
/// Inference calls are serialized through the session lock so one instance
/// can be shared by every request.
pub struct YoloModel {
    name: String,
    session: Mutex<Session>,
    input_size: u32,
    iou_threshold: f32,
    max_detections: usize,
}

impl YoloModel {
    /// Load the detector from an ONNX file
    pub fn load(model_path: &Path, config: &VisionConfig) -> Result<Self, VisionError> {
        let builder = Session::builder().map_err(|e| {
            VisionError::ModelUnavailable(format!("Failed to create ONNX session builder: {}", e))
        })?;
        let session = builder.commit_from_file(model_path).map_err(|e| {
            VisionError::ModelUnavailable(format!(
                "Failed to load YOLO model {}: {}",
                model_path.display(),
                e
            ))
        })?;

        let name = model_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "yolo".to_string());

        info!(
            "YOLO model loaded from {:?} (input {}x{})",
            model_path, config.input_size, config.input_size
        );

        Ok(Self {
            name,
            session: Mutex::new(session),
            input_size: config.input_size,
            iou_threshold: config.iou_threshold,
            max_detections: config.max_detections,
        })
    }

    fn run(&self, tensor: Vec<f32>) -> Result<(Vec<i64>, Vec<f32>), VisionError> {
        let size = self.input_size as usize;
        let input = Tensor::from_array(([1usize, 3, size, size], tensor.into_boxed_slice()))
            .map_err(|e| VisionError::Inference(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::Inference(format!("YOLO inference failed: {}", e)))?;

        let (_, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| VisionError::Inference("YOLO model produced no outputs".to_string()))?;
        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Inference(format!("Failed to extract output tensor: {}", e)))?;

        Ok((shape.iter().copied().collect(), data.to_vec()))
    }
}

impl Detector for YoloModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn infer(&self, frame: &Frame, threshold: f32) -> Result<Vec<Detection>, VisionError> {
        let mut mapping = letterbox(frame.image(), self.input_size)?;
        let (shape, data) = self.run(std::mem::take(&mut mapping.tensor))?;
        debug!(frame = frame.index(), ?shape, "YOLO output");

        let candidates = decode_output(&shape, &data, threshold)?;
        let mut detections: Vec<Detection> = candidates
            .into_iter()
            .map(|c| {
                let bbox = mapping.unmap(c.x1, c.y1, c.x2, c.y2, frame.width(), frame.height());
                Detection::new(c.class_id, c.confidence, Some(bbox))
            })
            .filter(|d| d.bbox.map(|b| b[2] > b[0] && b[3] > b[1]).unwrap_or(false))
            .collect();

        detections = apply_nms(detections, self.iou_threshold);
        detections.truncate(self.max_detections);

        debug!(frame = frame.index(), count = detections.len(), "YOLO detections");
        Ok(detections)
    }
}

/// A decoded box in model input coordinates
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Candidate {
    pub class_id: u32,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// Decode a raw YOLO output tensor.
///
/// Accepts `[1, 4 + nc, anchors]` (the default export layout) and the
/// transposed `[1, anchors, 4 + nc]`. Each anchor keeps its best class only.
pub(crate) fn decode_output(
    shape: &[i64],
    data: &[f32],
    threshold: f32,
) -> Result<Vec<Candidate>, VisionError> {
    if shape.len() != 3 || shape[0] != 1 {
        return Err(VisionError::Inference(format!(
            "Unexpected YOLO output shape {:?}",
            shape
        )));
    }
    let (a, b) = (shape[1].max(0) as usize, shape[2].max(0) as usize);
    // Anchors always outnumber channels in exported detectors
    let channels_first = a <= b;
    let (channels, anchors) = if channels_first { (a, b) } else { (b, a) };

    if channels <= 4 {
        return Err(VisionError::Inference(format!(
            "YOLO output has no class scores (shape {:?})",
            shape
        )));
    }
    let expected = channels
        .checked_mul(anchors)
        .ok_or_else(|| VisionError::Inference("Output shape would overflow".to_string()))?;
    if data.len() != expected {
        return Err(VisionError::Inference(format!(
            "YOLO output has {} values, expected {}",
            data.len(),
            expected
        )));
    }

    let at = |anchor: usize, channel: usize| -> f32 {
        if channels_first {
            data[channel * anchors + anchor]
        } else {
            data[anchor * channels + channel]
        }
    };

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let mut best_class = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for class in 0..channels - 4 {
            let score = at(anchor, 4 + class);
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }

        if !best_score.is_finite() || best_score < threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(anchor, 0), at(anchor, 1), at(anchor, 2), at(anchor, 3));
        if !cx.is_finite() || !cy.is_finite() || !w.is_finite() || !h.is_finite() {
            continue;
        }
        if w <= 0.0 || h <= 0.0 {
            continue;
        }

        candidates.push(Candidate {
            class_id: best_class as u32,
            confidence: best_score.clamp(0.0, 1.0),
            x1: cx - w / 2.0,
            y1: cy - h / 2.0,
            x2: cx + w / 2.0,
            y2: cy + h / 2.0,
        });
    }

    Ok(candidates)
}

/// Class-wise Non-Maximum Suppression, highest confidence first
pub(crate) fn apply_nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    if detections.is_empty() {
        return detections;
    }

    detections.retain(|d| d.confidence.is_finite() && d.confidence >= 0.0 && d.confidence <= 1.0);
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<Detection> = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }

        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] || detections[j].class_id != detections[i].class_id {
                continue;
            }

            if let (Some(a), Some(b)) = (&detections[i].bbox, &detections[j].bbox) {
                if compute_iou(a, b) > iou_threshold {
                    suppressed[j] = true;
                }
            }
        }
    }

    keep
}

/// IoU of two `[x1, y1, x2, y2]` boxes
pub(crate) fn compute_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return 0.0;
    }

    let inter_x_min = a[0].max(b[0]);
    let inter_y_min = a[1].max(b[1]);
    let inter_x_max = a[2].min(b[2]);
    let inter_y_max = a[3].min(b[3]);

    if inter_x_max <= inter_x_min || inter_y_max <= inter_y_min {
        return 0.0;
    }

    let inter_area = (inter_x_max - inter_x_min) * (inter_y_max - inter_y_min);
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union_area = area_a + area_b - inter_area;

    if union_area <= 0.0 || !union_area.is_finite() {
        return 0.0;
    }

    (inter_area / union_area).clamp(0.0, 1.0)
}
