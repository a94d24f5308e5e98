//! Decoded raster frames

use image::{DynamicImage, RgbImage};

/// One decoded still image in presentation order.
///
/// Pixels are 8-bit RGB, row major.
#[derive(Debug, Clone)]
pub struct Frame {
    index: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn from_dynamic(index: u64, image: DynamicImage) -> Self {
        Self::new(index, image.to_rgb8())
    }

    /// Position of the frame inside its source, starting at 0
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `(height, width)`, the order clients expect in `frame_size`
    pub fn size(&self) -> (u32, u32) {
        (self.image.height(), self.image.width())
    }
}
