//! Detector interface shared by the pipeline and the HTTP layer

use crate::error::VisionError;
use crate::frame::Frame;
use serde::{Deserialize, Serialize};

/// One object found by a detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_id: u32,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in original frame pixels
    pub bbox: Option<[f32; 4]>,
}

impl Detection {
    pub fn new(class_id: u32, confidence: f32, bbox: Option<[f32; 4]>) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
        }
    }
}

/// A pretrained model that finds objects in a single frame.
///
/// Implementations must be safe to share across sessions. Output order is
/// the model's order and an empty result is valid.
#[cfg_attr(test, mockall::automock)]
pub trait Detector: Send + Sync {
    fn name(&self) -> &str;

    /// Run the model on one frame, keeping only detections scoring at least `threshold`
    fn infer(&self, frame: &Frame, threshold: f32) -> Result<Vec<Detection>, VisionError>;
}
