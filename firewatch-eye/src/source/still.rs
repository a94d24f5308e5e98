//! Still images, from disk or base64

use super::FrameSource;
use crate::error::VisionError;
use crate::frame::Frame;
use base64::{engine::general_purpose, Engine as _};
use std::path::Path;

/// Single-frame source over a still image
pub struct ImageSource {
    frame: Option<Frame>,
}

impl ImageSource {
    pub fn open(path: &Path) -> Result<Self, VisionError> {
        let image = image::open(path).map_err(|e| {
            VisionError::UnsupportedMedia(format!("Cannot decode {}: {}", path.display(), e))
        })?;
        Ok(Self::from_frame(Frame::from_dynamic(0, image)))
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self { frame: Some(frame) }
    }
}

impl FrameSource for ImageSource {
    fn next_frame(&mut self) -> Option<Result<Frame, VisionError>> {
        self.frame.take().map(Ok)
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(1)
    }
}

/// Decode an encoded image (JPEG, PNG, ...) held in memory
pub fn decode_image_bytes(bytes: &[u8]) -> Result<Frame, VisionError> {
    if bytes.is_empty() {
        return Err(VisionError::UnsupportedMedia("Empty image".to_string()));
    }
    let image = image::load_from_memory(bytes)
        .map_err(|e| VisionError::UnsupportedMedia(format!("Cannot decode image: {}", e)))?;
    Ok(Frame::from_dynamic(0, image))
}

/// Decode a base64 frame, accepting a `data:<mime>;base64,` prefix
pub fn decode_base64_frame(encoded: &str) -> Result<Frame, VisionError> {
    let payload = strip_data_url(encoded.trim());
    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| VisionError::UnsupportedMedia(format!("Invalid base64 frame: {}", e)))?;
    decode_image_bytes(&bytes)
}

fn strip_data_url(encoded: &str) -> &str {
    if encoded.starts_with("data:") {
        if let Some((_, payload)) = encoded.split_once(',') {
            return payload;
        }
    }
    encoded
}
