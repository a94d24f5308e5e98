//! Stream emitter: runs the detector over a frame source, one event per frame

use crate::error::VisionError;
use crate::labels::ClassMap;
use crate::models::Detector;
use crate::processing::normalizer::{enforce_threshold, normalize, FrameMeta, FrameResult};
use crate::source::FrameSource;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Lifecycle of one streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
    Completed,
    Aborted,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    #[error("Frame source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("No decodable frames in source")]
    NoDecodableFrames,

    #[error("Consumer disconnected")]
    ConsumerDisconnected,

    /// An error that is not tied to a single frame, such as a lost model
    #[error("Stream failed: {0}")]
    Failed(String),
}

/// The receiving side of a stream has gone away
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Event sink closed")]
pub struct SinkClosed;

/// Destination for per-frame events
pub trait EventSink {
    fn emit(&mut self, result: FrameResult) -> Result<(), SinkClosed>;
}

impl EventSink for Vec<FrameResult> {
    fn emit(&mut self, result: FrameResult) -> Result<(), SinkClosed> {
        self.push(result);
        Ok(())
    }
}

/// How a session ended
#[derive(Debug)]
pub struct StreamOutcome {
    pub state: StreamState,
    /// Events handed to the sink
    pub emitted: u64,
    /// Frames dropped because they failed to decode or infer
    pub skipped: u64,
    pub abort_reason: Option<AbortReason>,
    /// Most recent per-frame failure, if any
    pub last_error: Option<VisionError>,
}

impl StreamOutcome {
    pub fn is_completed(&self) -> bool {
        self.state == StreamState::Completed
    }
}

/// Drives one session through `Idle -> Streaming -> Completed | Aborted`.
///
/// Frames are processed strictly in order and frame N+1 is not pulled until
/// the event for frame N has been accepted by the sink.
pub struct StreamEmitter {
    session_id: Uuid,
    detector: Arc<dyn Detector>,
    class_map: ClassMap,
    threshold: f32,
    state: StreamState,
}

impl StreamEmitter {
    pub fn new(detector: Arc<dyn Detector>, class_map: ClassMap, threshold: f32) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            detector,
            class_map,
            threshold,
            state: StreamState::Idle,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Consume the source, emitting one result per successfully processed frame
    pub fn run(
        mut self,
        source: Result<Box<dyn FrameSource>, VisionError>,
        sink: &mut dyn EventSink,
    ) -> StreamOutcome {
        let span = info_span!("stream", session = %self.session_id);
        let _guard = span.enter();

        let mut source = match source {
            Ok(source) => source,
            Err(e) => {
                warn!("Could not open frame source: {}", e);
                return self.abort(AbortReason::SourceUnavailable(e.to_string()), 0, 0, None);
            }
        };

        self.state = StreamState::Streaming;
        let total_frames = source.frame_count_hint();
        info!(?total_frames, "Streaming started");

        let mut emitted = 0u64;
        let mut skipped = 0u64;
        let mut decoded = 0u64;
        let mut last_error = None;

        while let Some(next) = source.next_frame() {
            let frame = match next {
                Ok(frame) => frame,
                Err(e) if !e.is_per_frame() => {
                    let reason = AbortReason::Failed(e.to_string());
                    return self.abort(reason, emitted, skipped, Some(e));
                }
                Err(e) => {
                    warn!("Skipping undecodable frame: {}", e);
                    skipped += 1;
                    last_error = Some(e);
                    continue;
                }
            };
            decoded += 1;

            let detections = match self.detector.infer(&frame, self.threshold) {
                Ok(detections) => enforce_threshold(detections, self.threshold),
                Err(e) if !e.is_per_frame() => {
                    let reason = AbortReason::Failed(e.to_string());
                    return self.abort(reason, emitted, skipped, Some(e));
                }
                Err(e) => {
                    warn!(frame = frame.index(), "Inference failed, skipping frame: {}", e);
                    skipped += 1;
                    last_error = Some(e);
                    continue;
                }
            };

            let result = normalize(
                detections,
                FrameMeta::of(&frame, total_frames),
                &self.class_map,
                Utc::now(),
            );
            debug!(
                frame = result.frame,
                detections = result.detections.len(),
                has_fire = result.has_fire,
                "Frame processed"
            );

            if sink.emit(result).is_err() {
                info!(frame = frame.index(), "Consumer went away, stopping stream");
                return self.abort(AbortReason::ConsumerDisconnected, emitted, skipped, last_error);
            }
            emitted += 1;
        }

        if decoded == 0 {
            return self.abort(AbortReason::NoDecodableFrames, emitted, skipped, last_error);
        }

        self.state = StreamState::Completed;
        info!(emitted, skipped, "Streaming completed");
        StreamOutcome {
            state: self.state,
            emitted,
            skipped,
            abort_reason: None,
            last_error,
        }
    }

    fn abort(
        &mut self,
        reason: AbortReason,
        emitted: u64,
        skipped: u64,
        last_error: Option<VisionError>,
    ) -> StreamOutcome {
        self.state = StreamState::Aborted;
        warn!(emitted, skipped, "Streaming aborted: {}", reason);
        StreamOutcome {
            state: self.state,
            emitted,
            skipped,
            abort_reason: Some(reason),
            last_error,
        }
    }
}
