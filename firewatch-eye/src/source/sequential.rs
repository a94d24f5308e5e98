//! Frame-by-frame reading with corrupt-frame recovery
//!
//! Decoders such as OpenCV report a corrupt frame and the end of the file the
//! same way: the read fails. After a failed read the source reads ahead a few
//! frames. A later good frame turns the failures into per-frame errors. When
//! no good frame follows, the source has ended, and any frames still owed
//! according to a known frame count are reported as corrupt.

use super::FrameSource;
use crate::error::VisionError;
use crate::frame::Frame;

/// Consecutive failed reads tolerated before the stream is considered over
pub(crate) const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Raw decoder behind a sequential source
pub(crate) trait RawFrames {
    type Raw;

    /// Next raw frame. `None` when the read failed or the input ended.
    fn read_raw(&mut self) -> Option<Self::Raw>;

    fn convert(&self, index: u64, raw: Self::Raw) -> Result<Frame, VisionError>;
}

pub(crate) struct SequentialSource<R: RawFrames> {
    reader: R,
    total: Option<u64>,
    next_index: u64,
    pending_failures: u32,
    pending: Option<R::Raw>,
    exhausted: bool,
}

impl<R: RawFrames> SequentialSource<R> {
    pub(crate) fn new(reader: R, total: Option<u64>) -> Self {
        Self {
            reader,
            total,
            next_index: 0,
            pending_failures: 0,
            pending: None,
            exhausted: false,
        }
    }

    fn corrupt(&mut self) -> Result<Frame, VisionError> {
        let index = self.next_index;
        self.next_index += 1;
        Err(VisionError::FrameDecode(format!(
            "Frame {} could not be decoded",
            index
        )))
    }

    fn emit(&mut self, raw: R::Raw) -> Result<Frame, VisionError> {
        let index = self.next_index;
        self.next_index += 1;
        self.reader.convert(index, raw)
    }

    /// Called after a failed read at `next_index`
    fn recover(&mut self) -> Option<Result<Frame, VisionError>> {
        let mut failed = 1u32;
        while failed <= MAX_CONSECUTIVE_FAILURES {
            match self.reader.read_raw() {
                Some(raw) => {
                    self.pending = Some(raw);
                    self.pending_failures = failed;
                    return self.next_frame();
                }
                None => failed += 1,
            }
        }

        self.exhausted = true;
        let owed = self
            .total
            .map(|total| total.saturating_sub(self.next_index))
            .unwrap_or(0)
            .min(u64::from(failed));
        self.pending_failures = owed as u32;
        self.next_frame()
    }
}

impl<R: RawFrames> FrameSource for SequentialSource<R> {
    fn next_frame(&mut self) -> Option<Result<Frame, VisionError>> {
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Some(self.corrupt());
        }
        if let Some(raw) = self.pending.take() {
            return Some(self.emit(raw));
        }
        if self.exhausted {
            return None;
        }

        match self.reader.read_raw() {
            Some(raw) => Some(self.emit(raw)),
            None => self.recover(),
        }
    }

    fn frame_count_hint(&self) -> Option<u64> {
        self.total
    }
}
