//! Error types for firewatch-eye

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    /// The model artifact is missing, corrupt or could not be loaded.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The input is not a decodable image or video.
    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    /// A single frame inside an otherwise readable source could not be decoded.
    #[error("Frame decode error: {0}")]
    FrameDecode(String),

    /// The model could not process a given input.
    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl VisionError {
    /// Errors that only affect the current frame of a stream.
    pub fn is_per_frame(&self) -> bool {
        matches!(self, VisionError::FrameDecode(_) | VisionError::Inference(_))
    }
}

impl From<ort::Error> for VisionError {
    fn from(err: ort::Error) -> Self {
        VisionError::Inference(err.to_string())
    }
}

#[cfg(feature = "video")]
impl From<opencv::Error> for VisionError {
    fn from(err: opencv::Error) -> Self {
        VisionError::FrameDecode(err.message)
    }
}
