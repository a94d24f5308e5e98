//! firewatch-eye: fire and smoke detection pipeline
//!
//! Decodes uploaded media into frames, runs a pretrained detector on each
//! frame and turns the raw detections into per-frame results that can be
//! returned directly or streamed frame by frame.

pub mod config;
pub mod error;
pub mod frame;
pub mod labels;
pub mod models;
pub mod processing;
pub mod source;
mod utils;

pub use config::VisionConfig;
pub use error::VisionError;
pub use frame::Frame;
pub use labels::{ClassLabel, ClassMap};
pub use models::{Detection, Detector};
pub use processing::{FrameResult, StreamEmitter, StreamOutcome, StreamState};
pub use source::{open_path, FrameSource};
