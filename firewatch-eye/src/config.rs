//! Configuration for firewatch-eye

use crate::labels::{ClassLabel, ClassMap};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_MAX_DETECTIONS: usize = 100;

/// Vision pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Path to the fire/smoke detector (ONNX export)
    pub model_path: PathBuf,
    /// Expected SHA-256 of the detector artifact, hex encoded
    pub model_sha256: Option<String>,
    /// Optional satellite wildfire classifier (ONNX export)
    pub satellite_model_path: Option<PathBuf>,
    /// Minimum score a detection must reach to be reported
    pub confidence_threshold: f32,
    /// IoU above which overlapping boxes of the same class are suppressed
    pub iou_threshold: f32,
    /// Square model input size in pixels
    pub input_size: u32,
    /// Upper bound on detections reported per frame
    pub max_detections: usize,
    /// Class id to semantic label table. Empty means unknown.
    pub class_labels: Vec<ClassLabel>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/fire_smoke_yolo_best.onnx"),
            model_sha256: None,
            satellite_model_path: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            input_size: DEFAULT_INPUT_SIZE,
            max_detections: DEFAULT_MAX_DETECTIONS,
            class_labels: vec![
                ClassLabel::new(0, "fire"),
                ClassLabel::new(1, "smoke"),
            ],
        }
    }
}

impl VisionConfig {
    /// Build the class map used by the normalizer
    pub fn class_map(&self) -> ClassMap {
        ClassMap::from_labels(&self.class_labels)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.confidence_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.confidence_threshold)
        {
            return Err("Confidence threshold must be between 0 and 1".to_string());
        }

        if !self.iou_threshold.is_finite() || self.iou_threshold <= 0.0 || self.iou_threshold > 1.0 {
            return Err("IoU threshold must be in (0, 1]".to_string());
        }

        if self.input_size < 32 || self.input_size > 4096 {
            return Err("Input size must be between 32 and 4096".to_string());
        }

        if self.input_size % 32 != 0 {
            return Err("Input size must be a multiple of 32".to_string());
        }

        if self.max_detections == 0 || self.max_detections > 1000 {
            return Err("Max detections must be between 1 and 1000".to_string());
        }

        if self.model_path.as_os_str().is_empty() {
            return Err("Model path must not be empty".to_string());
        }

        if let Some(checksum) = &self.model_sha256 {
            if checksum.len() != 64 || !checksum.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err("Model checksum must be 64 hex characters".to_string());
            }
        }

        let mut seen = HashSet::new();
        for label in &self.class_labels {
            if !seen.insert(label.id) {
                return Err(format!("Duplicate class id {} in class labels", label.id));
            }
            if label.label.trim().is_empty() {
                return Err(format!("Class id {} has an empty label", label.id));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = VisionConfig::default();
        assert_eq!(config.confidence_threshold, 0.25);
        assert_eq!(config.iou_threshold, 0.45);
        assert_eq!(config.input_size, 640);
        assert_eq!(config.max_detections, 100);
        assert_eq!(config.class_labels.len(), 2);
        assert!(config.satellite_model_path.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_threshold_range() {
        let mut config = VisionConfig::default();
        config.confidence_threshold = -0.1;
        assert!(config.validate().is_err());

        config.confidence_threshold = 1.1;
        assert!(config.validate().is_err());

        config.confidence_threshold = f32::NAN;
        assert!(config.validate().is_err());

        config.confidence_threshold = 0.0;
        assert!(config.validate().is_ok());

        config.confidence_threshold = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_iou() {
        let mut config = VisionConfig::default();
        config.iou_threshold = 0.0;
        assert!(config.validate().is_err());
        config.iou_threshold = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_input_size() {
        let mut config = VisionConfig::default();
        config.input_size = 16;
        assert!(config.validate().is_err());

        config.input_size = 650;
        assert!(config.validate().is_err());

        config.input_size = 320;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_duplicate_class_ids() {
        let mut config = VisionConfig::default();
        config.class_labels.push(ClassLabel::new(0, "flame"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_checksum() {
        let mut config = VisionConfig::default();
        config.model_sha256 = Some("abc".to_string());
        assert!(config.validate().is_err());

        config.model_sha256 = Some("a".repeat(64));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_json() {
        let config: VisionConfig =
            serde_json::from_str(r#"{"confidence_threshold": 0.4}"#).unwrap();
        assert_eq!(config.confidence_threshold, 0.4);
        assert_eq!(config.input_size, DEFAULT_INPUT_SIZE);
        assert_eq!(config.class_labels.len(), 2);
    }
}
