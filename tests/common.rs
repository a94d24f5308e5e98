// Shared fixtures for the HTTP-level tests

use axum::body::Body;
use axum::http::{header, Request, Response};
use firewatch_eye::models::{Detection, Detector};
use firewatch_eye::{ClassLabel, ClassMap, Frame, VisionError};
use firewatch_server::config::{CorsConfig, ProxyConfig};
use firewatch_server::http::ApiState;
use image::codecs::gif::GifEncoder;
use image::{Delay, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use serde_json::Value;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const BOUNDARY: &str = "firewatch-test-boundary";

/// Returns the same detections for every frame and counts calls
pub struct StubDetector {
    detections: Vec<Detection>,
    calls: AtomicUsize,
}

impl StubDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for StubDetector {
    fn name(&self) -> &str {
        "stub"
    }

    fn infer(&self, _frame: &Frame, _threshold: f32) -> Result<Vec<Detection>, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.detections.clone())
    }
}

/// Fails every inference
pub struct BrokenDetector;

impl Detector for BrokenDetector {
    fn name(&self) -> &str {
        "broken"
    }

    fn infer(&self, _frame: &Frame, _threshold: f32) -> Result<Vec<Detection>, VisionError> {
        Err(VisionError::Inference("session poisoned".to_string()))
    }
}

pub fn fire_map() -> ClassMap {
    ClassMap::from_labels(&[ClassLabel::new(0, "fire"), ClassLabel::new(1, "smoke")])
}

/// State around the given detector; keep the TempDir alive for the test
pub fn test_state(detector: Arc<dyn Detector>) -> (ApiState, TempDir) {
    let upload_dir = TempDir::new().unwrap();
    let proxy = ProxyConfig {
        timeout_secs: 2,
        ..ProxyConfig::default()
    };
    let http_client = firewatch_server::proxy::build_client(&proxy).unwrap();

    let state = ApiState {
        detector,
        satellite: None,
        class_map: Arc::new(fire_map()),
        threshold: 0.25,
        upload_dir: Arc::new(PathBuf::from(upload_dir.path())),
        max_upload_bytes: 4 * 1024 * 1024,
        proxy: Arc::new(proxy),
        cors: Arc::new(CorsConfig::default()),
        http_client,
    };
    (state, upload_dir)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbImage::from_pixel(width, height, Rgb([220, 90, 10]))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub fn gif_bytes(frames: usize) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut out);
        for i in 0..frames {
            let buffer = RgbaImage::from_pixel(16, 12, Rgba([(i * 40) as u8, 30, 30, 255]));
            let delay = Delay::from_numer_denom_ms(50, 1);
            encoder
                .encode_frame(image::Frame::from_parts(buffer, 0, 0, delay))
                .unwrap();
        }
    }
    out
}

/// Single-field multipart body
pub fn multipart_body(field: &str, file_name: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_request(uri: &str, field: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(field, file_name, content)))
        .unwrap()
}

pub fn json_request(uri: &str, json: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// JSON payloads of every `data:` line in an SSE body
pub fn sse_events(body: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(body)
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}
