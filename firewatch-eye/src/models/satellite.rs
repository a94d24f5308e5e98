//! Two-class wildfire classifier for satellite imagery

use crate::error::VisionError;
use crate::utils::{resize_to_chw, softmax};
use image::RgbImage;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::Path;
use tracing::info;

const INPUT_SIZE: u32 = 224;

/// Class probabilities, in the model's output order
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SatellitePrediction {
    pub no_fire: f32,
    pub wildfire: f32,
}

impl SatellitePrediction {
    pub fn from_logits(logits: &[f32]) -> Result<Self, VisionError> {
        if logits.len() != 2 {
            return Err(VisionError::Inference(format!(
                "Satellite classifier produced {} outputs, expected 2",
                logits.len()
            )));
        }
        let probs = softmax(logits);
        Ok(Self {
            no_fire: probs[0],
            wildfire: probs[1],
        })
    }
}

/// ResNet-style classifier fed a 224x224 RGB tensor scaled to [0, 1].
///
/// The weights were trained on plain `[0, 1]` inputs, with no mean/std step.
pub struct SatelliteClassifier {
    session: Mutex<Session>,
}

impl SatelliteClassifier {
    pub fn load(model_path: &Path) -> Result<Self, VisionError> {
        let builder = Session::builder().map_err(|e| {
            VisionError::ModelUnavailable(format!("Failed to create ONNX session builder: {}", e))
        })?;
        let session = builder.commit_from_file(model_path).map_err(|e| {
            VisionError::ModelUnavailable(format!(
                "Failed to load satellite model {}: {}",
                model_path.display(),
                e
            ))
        })?;

        info!("Satellite classifier loaded from {:?}", model_path);
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    pub fn classify(&self, image: &RgbImage) -> Result<SatellitePrediction, VisionError> {
        let tensor = preprocess(image)?;

        let size = INPUT_SIZE as usize;
        let input = Tensor::from_array(([1usize, 3, size, size], tensor.into_boxed_slice()))
            .map_err(|e| VisionError::Inference(format!("Failed to create input tensor: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| VisionError::Inference(format!("Satellite inference failed: {}", e)))?;
        let (_, output) = outputs.iter().next().ok_or_else(|| {
            VisionError::Inference("Satellite model produced no outputs".to_string())
        })?;
        let (_, logits) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| VisionError::Inference(format!("Failed to extract output tensor: {}", e)))?;

        SatellitePrediction::from_logits(logits)
    }
}

/// Resize to the classifier input and convert to CHW in [0, 1]
fn preprocess(image: &RgbImage) -> Result<Vec<f32>, VisionError> {
    resize_to_chw(image, INPUT_SIZE, INPUT_SIZE)
}
