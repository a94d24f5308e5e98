//! Vision model management and inference

pub mod detector;
pub mod manager;
pub mod satellite;
pub mod yolo;

pub use detector::{Detection, Detector};
pub use manager::ModelManager;
pub use satellite::{SatelliteClassifier, SatellitePrediction};
pub use yolo::YoloModel;
