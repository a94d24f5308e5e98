//! Container video decoded through OpenCV

use super::sequential::{RawFrames, SequentialSource};
use super::FrameSource;
use crate::error::VisionError;
use crate::frame::Frame;
use image::RgbImage;
use opencv::core::Mat;
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use std::path::Path;
use tracing::debug;

struct Capture {
    capture: VideoCapture,
}

impl RawFrames for Capture {
    type Raw = Mat;

    fn read_raw(&mut self) -> Option<Mat> {
        let mut mat = Mat::default();
        let read = self.capture.read(&mut mat).unwrap_or(false);
        if !read || mat.rows() <= 0 || mat.cols() <= 0 {
            return None;
        }
        Some(mat)
    }

    fn convert(&self, index: u64, bgr: Mat) -> Result<Frame, VisionError> {
        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
        let (width, height) = (rgb.cols(), rgb.rows());
        let bytes = rgb.data_bytes()?.to_vec();
        let image = RgbImage::from_raw(width as u32, height as u32, bytes).ok_or_else(|| {
            VisionError::FrameDecode(format!("Frame {} has an unexpected buffer size", index))
        })?;
        Ok(Frame::new(index, image))
    }
}

/// Sequential frame reader over a video file.
///
/// Works with or without a frame count from the container: a damaged frame
/// is reported as a per-frame error as long as a readable frame follows it.
pub struct VideoFileSource {
    inner: SequentialSource<Capture>,
}

impl VideoFileSource {
    pub fn open(path: &Path) -> Result<Self, VisionError> {
        let path_str = path.to_str().ok_or_else(|| {
            VisionError::UnsupportedMedia(format!("Non UTF-8 path {}", path.display()))
        })?;
        let capture = VideoCapture::from_file(path_str, videoio::CAP_ANY).map_err(|e| {
            VisionError::UnsupportedMedia(format!("Cannot open video {}: {}", path.display(), e))
        })?;
        let opened = capture.is_opened().unwrap_or(false);
        if !opened {
            return Err(VisionError::UnsupportedMedia(format!(
                "Cannot open video {}",
                path.display()
            )));
        }

        let total = capture
            .get(videoio::CAP_PROP_FRAME_COUNT)
            .ok()
            .filter(|count| count.is_finite() && *count > 0.0)
            .map(|count| count as u64);
        debug!("Opened video {:?} ({:?} frames)", path, total);

        Ok(Self {
            inner: SequentialSource::new(Capture { capture }, total),
        })
    }
}

impl FrameSource for VideoFileSource {
    fn next_frame(&mut self) -> Option<Result<Frame, VisionError>> {
        self.inner.next_frame()
    }

    fn frame_count_hint(&self) -> Option<u64> {
        self.inner.frame_count_hint()
    }
}

#[cfg(all(test, feature = "video"))]
mod tests {
    use super::*;
    use opencv::core::{Scalar, Size, CV_8UC3};
    use opencv::videoio::VideoWriter;
    use tempfile::TempDir;

    fn write_clip(path: &Path, frames: i32) {
        let fourcc = VideoWriter::fourcc('M', 'J', 'P', 'G').unwrap();
        let mut writer =
            VideoWriter::new(path.to_str().unwrap(), fourcc, 10.0, Size::new(32, 24), true)
                .unwrap();
        assert!(writer.is_opened().unwrap());
        for i in 0..frames {
            let shade = f64::from(i * 40);
            let mat =
                Mat::new_rows_cols_with_default(24, 32, CV_8UC3, Scalar::all(shade)).unwrap();
            writer.write(&mat).unwrap();
        }
        writer.release().unwrap();
    }

    #[test]
    fn test_reads_every_frame_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.avi");
        write_clip(&path, 3);

        let mut source = VideoFileSource::open(&path).unwrap();
        let mut indices = Vec::new();
        while let Some(frame) = source.next_frame() {
            let frame = frame.unwrap();
            assert_eq!(frame.size(), (24, 32));
            indices.push(frame.index());
        }
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_truncated_clip_ends_without_losing_earlier_frames() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.avi");
        write_clip(&path, 6);

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() * 2 / 3]).unwrap();

        let mut frames = 0;
        let mut position = 0u64;
        if let Ok(mut source) = VideoFileSource::open(&path) {
            while let Some(item) = source.next_frame() {
                match item {
                    Ok(frame) => {
                        assert_eq!(frame.index(), position);
                        frames += 1;
                    }
                    Err(e) => assert!(e.is_per_frame()),
                }
                position += 1;
            }
        }
        assert!(frames < 6);
    }

    #[test]
    fn test_garbage_file_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"not a video container").unwrap();
        assert!(matches!(
            VideoFileSource::open(&path),
            Err(VisionError::UnsupportedMedia(_))
        ));
    }
}
