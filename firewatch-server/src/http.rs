// HTTP server with the detection, streaming and proxy routes

use crate::config::{CorsConfig, ProxyConfig};
use crate::error::ApiError;
use crate::proxy::proxy_camera_handler;
use crate::uploads::{read_file_field, ScratchUpload, UploadedFile};
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderName, HeaderValue, Method},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use chrono::Utc;
use firewatch_eye::models::{Detection, Detector, SatelliteClassifier, SatellitePrediction};
use firewatch_eye::processing::{
    enforce_threshold, normalize, AbortReason, EventSink, FrameMeta, FrameResult, SinkClosed,
    StreamEmitter, StreamOutcome,
};
use firewatch_eye::source::{self, decode_base64_frame, decode_image_bytes};
use firewatch_eye::ClassMap;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

// API state
#[derive(Clone)]
pub struct ApiState {
    pub detector: Arc<dyn Detector>,
    pub satellite: Option<Arc<SatelliteClassifier>>,
    pub class_map: Arc<ClassMap>,
    /// Minimum confidence for every reported detection
    pub threshold: f32,
    pub upload_dir: Arc<PathBuf>,
    pub max_upload_bytes: usize,
    pub proxy: Arc<ProxyConfig>,
    pub cors: Arc<CorsConfig>,
    pub http_client: reqwest::Client,
}

impl ApiState {
    fn emitter(&self) -> StreamEmitter {
        StreamEmitter::new(
            self.detector.clone(),
            self.class_map.as_ref().clone(),
            self.threshold,
        )
    }
}

// Response types
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadDetectionResponse {
    pub detections: Vec<Detection>,
    pub has_fire: bool,
    pub total_detections: usize,
    pub frames_processed: u64,
}

#[derive(Debug, Deserialize)]
pub struct FrameRequest {
    #[serde(default)]
    pub frame: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DebugInfo {
    pub confidence_threshold: f32,
    /// Boxes the detector returned before the threshold was enforced
    pub total_boxes_checked: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FrameResponse {
    #[serde(flatten)]
    pub result: FrameResult,
    pub debug_info: DebugInfo,
}

/// One SSE payload
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StreamMessage {
    Frame(FrameResult),
    Done {
        done: bool,
        frames_processed: u64,
        frames_skipped: u64,
    },
    Error {
        error: String,
    },
}

/// Create HTTP router with all API routes
pub fn create_router(state: ApiState) -> Router {
    let cors = cors_layer(&state.cors);
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/", get(health_handler))
        .route("/health", get(health_handler))
        .route("/detect/fire-smoke", post(detect_upload_handler))
        .route("/detect/fire-smoke/stream", post(detect_stream_handler))
        .route("/detect/frame", post(detect_frame_handler))
        .route("/detect/satellite-fire", post(detect_satellite_handler))
        .route("/proxy/camera", get(proxy_camera_handler))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if config.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Map a finished run with nothing to show into the error the caller sees
fn outcome_error(outcome: StreamOutcome) -> ApiError {
    match (outcome.abort_reason, outcome.last_error) {
        (Some(AbortReason::SourceUnavailable(msg)), _) => ApiError::UnsupportedMedia(msg),
        (_, Some(err)) => err.into(),
        (Some(reason), None) => ApiError::UnsupportedMedia(reason.to_string()),
        (None, None) => ApiError::Inference("No frame could be processed".to_string()),
    }
}

/// Write the upload to scratch and run the emitter over it on the calling thread
fn run_upload(
    emitter: StreamEmitter,
    upload: UploadedFile,
    upload_dir: &std::path::Path,
    sink: &mut dyn EventSink,
) -> Result<StreamOutcome, ApiError> {
    let scratch = ScratchUpload::persist(&upload, upload_dir)?;
    drop(upload);
    let outcome = emitter.run(source::open_path(scratch.path()), sink);
    // Scratch file is removed here, whatever the outcome
    drop(scratch);
    Ok(outcome)
}

/// `POST /detect/fire-smoke`: detections aggregated over every frame
async fn detect_upload_handler(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Json<UploadDetectionResponse>, ApiError> {
    let upload = read_file_field(&mut multipart).await?;
    let emitter = state.emitter();
    let upload_dir = state.upload_dir.clone();

    let (outcome, events) = tokio::task::spawn_blocking(move || {
        let mut events: Vec<FrameResult> = Vec::new();
        run_upload(emitter, upload, &upload_dir, &mut events).map(|outcome| (outcome, events))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Detection task failed: {}", e)))??;

    if events.is_empty() {
        return Err(outcome_error(outcome));
    }

    let frames_processed = events.len() as u64;
    let has_fire = events.iter().any(|e| e.has_fire);
    let detections: Vec<Detection> = events.into_iter().flat_map(|e| e.detections).collect();
    info!(
        frames = frames_processed,
        detections = detections.len(),
        has_fire,
        "Upload processed"
    );

    Ok(Json(UploadDetectionResponse {
        total_detections: detections.len(),
        detections,
        has_fire,
        frames_processed,
    }))
}

/// Forwards emitter events into the SSE channel
struct ChannelSink {
    tx: mpsc::Sender<StreamMessage>,
}

impl EventSink for ChannelSink {
    fn emit(&mut self, result: FrameResult) -> Result<(), SinkClosed> {
        self.tx
            .blocking_send(StreamMessage::Frame(result))
            .map_err(|_| SinkClosed)
    }
}

fn to_event(message: StreamMessage) -> Result<Event, Infallible> {
    match serde_json::to_string(&message) {
        Ok(json) => Ok(Event::default().data(json)),
        Err(e) => {
            error!("Failed to serialize stream event: {}", e);
            Ok(Event::default().data(r#"{"error":"Failed to serialize event"}"#))
        }
    }
}

/// `POST /detect/fire-smoke/stream`: one SSE event per processed frame
async fn detect_stream_handler(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_file_field(&mut multipart).await?;
    let emitter = state.emitter();
    let session = emitter.session_id();
    let upload_dir = state.upload_dir.clone();
    let (tx, rx) = mpsc::channel::<StreamMessage>(1);

    info!(%session, file = ?upload.file_name, "Starting detection stream");
    tokio::task::spawn_blocking(move || {
        let mut sink = ChannelSink { tx: tx.clone() };
        let final_message = match run_upload(emitter, upload, &upload_dir, &mut sink) {
            Ok(outcome) => match outcome.abort_reason {
                None => Some(StreamMessage::Done {
                    done: true,
                    frames_processed: outcome.emitted,
                    frames_skipped: outcome.skipped,
                }),
                Some(AbortReason::ConsumerDisconnected) => None,
                Some(reason) => Some(StreamMessage::Error {
                    error: reason.to_string(),
                }),
            },
            Err(e) => Some(StreamMessage::Error {
                error: e.public_message(),
            }),
        };

        if let Some(message) = final_message {
            if tx.blocking_send(message).is_err() {
                info!(%session, "Client left before the final event");
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(to_event);
    let sse = Sse::new(stream).keep_alive(KeepAlive::default());

    Ok((
        [
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (
                HeaderName::from_static("x-accel-buffering"),
                HeaderValue::from_static("no"),
            ),
        ],
        sse,
    )
        .into_response())
}

/// `POST /detect/frame`: a single base64 frame from a live camera
async fn detect_frame_handler(
    State(state): State<ApiState>,
    payload: Result<Json<FrameRequest>, JsonRejection>,
) -> Result<Json<FrameResponse>, ApiError> {
    let Json(request) = payload
        .map_err(|e| ApiError::BadRequest(format!("Invalid frame request: {}", e.body_text())))?;
    if request.frame.trim().is_empty() {
        return Err(ApiError::BadRequest("No frame data provided".to_string()));
    }

    let detector = state.detector.clone();
    let threshold = state.threshold;
    let (frame, raw) = tokio::task::spawn_blocking(move || {
        let frame = decode_base64_frame(&request.frame)?;
        let raw = detector.infer(&frame, threshold)?;
        Ok::<_, ApiError>((frame, raw))
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Detection task failed: {}", e)))??;

    let total_boxes_checked = raw.len();
    let detections = enforce_threshold(raw, threshold);
    let result = normalize(
        detections,
        FrameMeta::of(&frame, None),
        &state.class_map,
        Utc::now(),
    );

    if result.has_fire {
        info!(detections = result.detections.len(), "Fire detected in live frame");
    }

    Ok(Json(FrameResponse {
        result,
        debug_info: DebugInfo {
            confidence_threshold: threshold,
            total_boxes_checked,
        },
    }))
}

/// `POST /detect/satellite-fire`: wildfire probability for a satellite tile
async fn detect_satellite_handler(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Json<SatellitePrediction>, ApiError> {
    let classifier = state.satellite.clone().ok_or_else(|| {
        ApiError::ModelUnavailable("Satellite classifier is not configured".to_string())
    })?;
    let upload = read_file_field(&mut multipart).await?;

    let prediction = tokio::task::spawn_blocking(move || {
        let frame = decode_image_bytes(&upload.bytes)?;
        classifier.classify(frame.image())
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Classification task failed: {}", e)))??;

    Ok(Json(prediction))
}
