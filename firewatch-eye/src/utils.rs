//! Utility functions for vision processing

use crate::error::VisionError;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Gray used by YOLO exporters for letterbox padding
const PAD_VALUE: u8 = 114;

/// Largest input tensor we are willing to allocate (elements)
const MAX_TENSOR_ELEMENTS: usize = 100_000_000;

/// Result of letterboxing a frame into a square model input
#[derive(Debug, Clone)]
pub struct Letterbox {
    /// CHW float tensor in [0, 1], RGB channel order
    pub tensor: Vec<f32>,
    /// Factor applied to the original frame
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Map a box from model input space back to original frame pixels
    pub fn unmap(&self, x1: f32, y1: f32, x2: f32, y2: f32, width: u32, height: u32) -> [f32; 4] {
        let w = width as f32;
        let h = height as f32;
        [
            ((x1 - self.pad_x) / self.scale).clamp(0.0, w),
            ((y1 - self.pad_y) / self.scale).clamp(0.0, h),
            ((x2 - self.pad_x) / self.scale).clamp(0.0, w),
            ((y2 - self.pad_y) / self.scale).clamp(0.0, h),
        ]
    }
}

/// Resize keeping aspect ratio, pad to `size` x `size` and convert to CHW
pub fn letterbox(image: &RgbImage, size: u32) -> Result<Letterbox, VisionError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(VisionError::FrameDecode("Invalid image dimensions".to_string()));
    }
    if size == 0 {
        return Err(VisionError::Inference("Target dimensions cannot be zero".to_string()));
    }

    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    if !scale.is_finite() || scale <= 0.0 {
        return Err(VisionError::FrameDecode(format!(
            "Cannot letterbox {}x{} frame",
            width, height
        )));
    }

    let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);
    let resized = imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let offset_x = (size - new_w) / 2;
    let offset_y = (size - new_h) / 2;
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
    imageops::replace(&mut canvas, &resized, offset_x as i64, offset_y as i64);

    Ok(Letterbox {
        tensor: to_chw_tensor(&canvas)?,
        scale,
        pad_x: offset_x as f32,
        pad_y: offset_y as f32,
    })
}

/// Plain resize to `width` x `height` followed by CHW conversion
pub fn resize_to_chw(image: &RgbImage, width: u32, height: u32) -> Result<Vec<f32>, VisionError> {
    if width == 0 || height == 0 {
        return Err(VisionError::Inference("Target dimensions cannot be zero".to_string()));
    }
    let resized = imageops::resize(image, width, height, FilterType::Triangle);
    to_chw_tensor(&resized)
}

/// Convert an RGB image to a CHW float tensor normalized to [0, 1]
pub fn to_chw_tensor(image: &RgbImage) -> Result<Vec<f32>, VisionError> {
    let (width, height) = image.dimensions();
    let hw = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| VisionError::Inference("Image dimensions would overflow".to_string()))?;
    let total = hw
        .checked_mul(3)
        .ok_or_else(|| VisionError::Inference("Tensor size would overflow".to_string()))?;
    if total > MAX_TENSOR_ELEMENTS {
        return Err(VisionError::Inference(
            "Input tensor too large (max 100M elements)".to_string(),
        ));
    }

    let mut tensor = vec![0.0f32; total];
    for (i, pixel) in image.pixels().enumerate() {
        for c in 0..3 {
            tensor[c * hw + i] = pixel[c] as f32 / 255.0;
        }
    }
    Ok(tensor)
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; logits.len()];
    }
    let exps: Vec<f32> = logits
        .iter()
        .map(|v| if v.is_finite() { (v - max).exp() } else { 0.0 })
        .collect();
    let sum: f32 = exps.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|v| v / sum).collect()
}
