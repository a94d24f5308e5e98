//! Model manager: locates, verifies and loads model artifacts at startup

use crate::config::VisionConfig;
use crate::error::VisionError;
use crate::models::satellite::SatelliteClassifier;
use crate::models::yolo::YoloModel;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Smallest file we accept as a model (anything smaller is corrupt)
const MIN_MODEL_SIZE: u64 = 1024;

/// Resolves and loads the models named in the vision configuration.
///
/// Every failure maps to `ModelUnavailable`, which the server treats as fatal.
pub struct ModelManager {
    config: Arc<VisionConfig>,
}

impl ModelManager {
    pub fn new(config: Arc<VisionConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// Check that a model file exists and looks like a real artifact
    pub fn ensure_model(&self, path: &Path) -> Result<PathBuf, VisionError> {
        let metadata = fs::metadata(path).map_err(|e| {
            VisionError::ModelUnavailable(format!("Model file {} not found: {}", path.display(), e))
        })?;

        if !metadata.is_file() {
            return Err(VisionError::ModelUnavailable(format!(
                "Model path {} is not a file",
                path.display()
            )));
        }

        // Minimum size check (prevent empty/corrupted files)
        if metadata.len() < MIN_MODEL_SIZE {
            return Err(VisionError::ModelUnavailable(format!(
                "Model file {} too small ({} bytes), likely corrupted",
                path.display(),
                metadata.len()
            )));
        }

        Ok(path.to_path_buf())
    }

    /// Compare the file's SHA-256 against `expected` (hex, case-insensitive)
    pub fn verify_checksum(&self, path: &Path, expected: &str) -> Result<(), VisionError> {
        let computed = sha256_file(path)?;
        if !computed.eq_ignore_ascii_case(expected) {
            return Err(VisionError::ModelUnavailable(format!(
                "Checksum mismatch for model {}: expected {}, got {}",
                path.display(),
                expected,
                computed
            )));
        }
        info!("Verified checksum for model {:?}", path);
        Ok(())
    }

    /// Resolve and verify the detector artifact without loading it
    pub fn prepare_detector(&self) -> Result<PathBuf, VisionError> {
        let path = self.ensure_model(&self.config.model_path)?;
        match &self.config.model_sha256 {
            Some(expected) => self.verify_checksum(&path, expected)?,
            None => info!("Checksum verification skipped for {:?}", path),
        }
        Ok(path)
    }

    /// Load the fire/smoke detector
    pub fn load_detector(&self) -> Result<YoloModel, VisionError> {
        let path = self.prepare_detector()?;
        YoloModel::load(&path, &self.config)
    }

    /// Load the satellite classifier if one is configured
    pub fn load_satellite(&self) -> Result<Option<SatelliteClassifier>, VisionError> {
        let Some(path) = &self.config.satellite_model_path else {
            warn!("No satellite model configured, satellite endpoint disabled");
            return Ok(None);
        };
        let path = self.ensure_model(path)?;
        SatelliteClassifier::load(&path).map(Some)
    }
}

/// Hex-encoded SHA-256 of a file, streamed in chunks
pub fn sha256_file(path: &Path) -> Result<String, VisionError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
