// Startup: load models once and assemble the shared API state

use crate::config::ServerConfig;
use crate::http::ApiState;
use crate::proxy::build_client;
use firewatch_eye::models::{Detector, ModelManager, SatelliteClassifier};
use firewatch_eye::VisionError;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Model unavailable: {0}")]
    Model(#[from] VisionError),

    #[error("Upload directory {path}: {source}")]
    UploadDir {
        path: String,
        source: std::io::Error,
    },

    #[error("HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Models shared by every request
pub struct LoadedModels {
    pub detector: Arc<dyn Detector>,
    pub satellite: Option<Arc<SatelliteClassifier>>,
}

/// Load the detector (and the optional satellite classifier).
///
/// Any failure here is fatal: the server must not start without its model.
pub fn load_models(config: &ServerConfig) -> Result<LoadedModels, StartupError> {
    let manager = ModelManager::new(Arc::new(config.vision.clone()));

    let detector = manager.load_detector()?;
    info!("Detector '{}' ready", detector.name());

    let satellite = manager.load_satellite()?.map(Arc::new);
    if satellite.is_some() {
        info!("Satellite classifier ready");
    }

    Ok(LoadedModels {
        detector: Arc::new(detector),
        satellite,
    })
}

/// Create the upload scratch directory if needed
pub fn prepare_upload_dir(path: &Path) -> Result<(), StartupError> {
    std::fs::create_dir_all(path).map_err(|source| StartupError::UploadDir {
        path: path.display().to_string(),
        source,
    })
}

/// Assemble the router state from configuration and loaded models
pub fn build_state(config: &ServerConfig, models: LoadedModels) -> Result<ApiState, StartupError> {
    prepare_upload_dir(&config.server.upload_dir)?;
    let http_client = build_client(&config.proxy)?;

    Ok(ApiState {
        detector: models.detector,
        satellite: models.satellite,
        class_map: Arc::new(config.vision.class_map()),
        threshold: config.vision.confidence_threshold,
        upload_dir: Arc::new(config.server.upload_dir.clone()),
        max_upload_bytes: config.server.max_upload_bytes,
        proxy: Arc::new(config.proxy.clone()),
        cors: Arc::new(config.cors.clone()),
        http_client,
    })
}
