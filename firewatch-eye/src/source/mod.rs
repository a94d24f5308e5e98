//! Frame sources: turn uploaded media into an ordered sequence of frames

mod gif;
#[cfg_attr(not(feature = "video"), allow(dead_code))]
mod sequential;
mod still;
#[cfg(feature = "video")]
mod video;

pub use self::gif::GifSource;
pub use self::still::{decode_base64_frame, decode_image_bytes, ImageSource};
#[cfg(feature = "video")]
pub use self::video::VideoFileSource;

use crate::error::VisionError;
use crate::frame::Frame;
use std::path::Path;

/// Container extensions decoded as video
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "flv", "wmv"];

/// A lazily decoded, finite sequence of frames.
///
/// `None` marks the end of the source. An `Err` item affects only that frame;
/// the caller may keep pulling.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Result<Frame, VisionError>>;

    /// Total number of frames, when the container reports it
    fn frame_count_hint(&self) -> Option<u64> {
        None
    }
}

/// How a file is decoded, picked from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Still,
    Animated,
    Video,
}

impl MediaKind {
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else if ext == "gif" {
            MediaKind::Animated
        } else {
            MediaKind::Still
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(MediaKind::Still)
    }
}

/// Open the right frame source for a file on disk
pub fn open_path(path: &Path) -> Result<Box<dyn FrameSource>, VisionError> {
    match MediaKind::from_path(path) {
        MediaKind::Still => Ok(Box::new(ImageSource::open(path)?)),
        MediaKind::Animated => Ok(Box::new(GifSource::open(path)?)),
        MediaKind::Video => open_video(path),
    }
}

#[cfg(feature = "video")]
fn open_video(path: &Path) -> Result<Box<dyn FrameSource>, VisionError> {
    Ok(Box::new(VideoFileSource::open(path)?))
}

#[cfg(not(feature = "video"))]
fn open_video(path: &Path) -> Result<Box<dyn FrameSource>, VisionError> {
    Err(VisionError::UnsupportedMedia(format!(
        "Video decoding is not enabled in this build ({})",
        path.display()
    )))
}

/// Source over frames already held in memory
pub struct MemorySource {
    frames: std::vec::IntoIter<Result<Frame, VisionError>>,
    total: u64,
}

impl MemorySource {
    pub fn new(frames: Vec<Result<Frame, VisionError>>) -> Self {
        let total = frames.len() as u64;
        Self {
            frames: frames.into_iter(),
            total,
        }
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Option<Result<Frame, VisionError>> {
        self.frames.next()
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.total)
    }
}
