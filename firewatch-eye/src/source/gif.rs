//! Animated GIF frames

use super::FrameSource;
use crate::error::VisionError;
use crate::frame::Frame;
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, Frames};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Lazily decodes the frames of an animated GIF
pub struct GifSource {
    frames: Frames<'static>,
    next_index: u64,
}

impl GifSource {
    pub fn open(path: &Path) -> Result<Self, VisionError> {
        let file = File::open(path).map_err(|e| {
            VisionError::UnsupportedMedia(format!("Cannot open {}: {}", path.display(), e))
        })?;
        let decoder = GifDecoder::new(BufReader::new(file)).map_err(|e| {
            VisionError::UnsupportedMedia(format!("Cannot decode GIF {}: {}", path.display(), e))
        })?;
        Ok(Self {
            frames: decoder.into_frames(),
            next_index: 0,
        })
    }
}

impl FrameSource for GifSource {
    fn next_frame(&mut self) -> Option<Result<Frame, VisionError>> {
        let decoded = self.frames.next()?;
        let index = self.next_index;
        self.next_index += 1;
        Some(
            decoded
                .map(|frame| {
                    Frame::new(index, DynamicImage::ImageRgba8(frame.into_buffer()).to_rgb8())
                })
                .map_err(|e| VisionError::FrameDecode(format!("GIF frame {}: {}", index, e))),
        )
    }
}
