//! Detection normalizer: raw detector output to per-frame results

use crate::frame::Frame;
use crate::labels::ClassMap;
use crate::models::Detection;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized result for one processed frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    /// 0-based index of the frame in its source
    pub frame: u64,
    pub detections: Vec<Detection>,
    pub has_fire: bool,
    pub timestamp: DateTime<Utc>,
    /// `[height, width]`
    pub frame_size: [u32; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<u64>,
    /// Percentage of the source processed so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
}

/// Frame metadata the normalizer needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMeta {
    pub index: u64,
    pub height: u32,
    pub width: u32,
    pub total_frames: Option<u64>,
}

impl FrameMeta {
    pub fn of(frame: &Frame, total_frames: Option<u64>) -> Self {
        let (height, width) = frame.size();
        Self {
            index: frame.index(),
            height,
            width,
            total_frames,
        }
    }

    fn progress(&self) -> Option<f32> {
        let total = self.total_frames.filter(|total| *total > 0)?;
        let done = (self.index + 1) as f64 / total as f64 * 100.0;
        Some(done.min(100.0) as f32)
    }
}

/// Whether a set of detections should raise the fire alarm
pub fn has_fire(detections: &[Detection], class_map: &ClassMap) -> bool {
    detections
        .iter()
        .any(|detection| class_map.is_fire_relevant(detection.class_id))
}

/// Drop detections scoring below `threshold`
pub fn enforce_threshold(mut detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    detections.retain(|detection| detection.confidence >= threshold);
    detections
}

/// Build the result for one frame.
///
/// Pure: the same inputs always give the same result.
pub fn normalize(
    detections: Vec<Detection>,
    meta: FrameMeta,
    class_map: &ClassMap,
    timestamp: DateTime<Utc>,
) -> FrameResult {
    FrameResult {
        frame: meta.index,
        has_fire: has_fire(&detections, class_map),
        detections,
        timestamp,
        frame_size: [meta.height, meta.width],
        total_frames: meta.total_frames,
        progress: meta.progress(),
    }
}
