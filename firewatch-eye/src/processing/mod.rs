//! Frame processing pipeline

pub mod normalizer;
pub mod stream;

pub use normalizer::{enforce_threshold, has_fire, normalize, FrameMeta, FrameResult};
pub use stream::{AbortReason, EventSink, SinkClosed, StreamEmitter, StreamOutcome, StreamState};
