// HTTP API tests: health, upload detection, live frames, satellite

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::{engine::general_purpose, Engine as _};
use firewatch_eye::models::Detection;
use firewatch_server::http::create_router;
use firewatch_tests::*;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

fn fire_detections() -> Vec<Detection> {
    vec![Detection::new(0, 0.92, Some([1.0, 1.0, 8.0, 6.0]))]
}

#[tokio::test]
async fn test_health() {
    let (state, _dir) = test_state(Arc::new(StubDetector::new(Vec::new())));
    let app = create_router(state);

    for uri in ["/", "/health"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert!(json["version"].is_string());
    }
}

#[tokio::test]
async fn test_frame_with_fire() {
    let detector = Arc::new(StubDetector::new(vec![
        Detection::new(0, 0.92, Some([2.0, 2.0, 10.0, 8.0])),
        Detection::new(1, 0.10, Some([0.0, 0.0, 4.0, 4.0])),
    ]));
    let (state, _dir) = test_state(detector.clone());
    let app = create_router(state);

    let frame = format!(
        "data:image/png;base64,{}",
        general_purpose::STANDARD.encode(png_bytes(20, 10))
    );
    let response = app
        .oneshot(json_request("/detect/frame", &json!({ "frame": frame })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["has_fire"], true);
    assert_eq!(json["frame"], 0);
    assert_eq!(json["frame_size"], json!([10, 20]));
    assert!(json["timestamp"].is_string());

    // The low-confidence box is dropped but still counted
    let detections = json["detections"].as_array().unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0]["class"], 0);
    assert_eq!(json["debug_info"]["total_boxes_checked"], 2);
    assert_eq!(json["debug_info"]["confidence_threshold"], 0.25);
    assert_eq!(detector.calls(), 1);
}

#[tokio::test]
async fn test_frame_without_prefix_and_no_fire() {
    let (state, _dir) = test_state(Arc::new(StubDetector::new(Vec::new())));
    let app = create_router(state);

    let frame = general_purpose::STANDARD.encode(png_bytes(8, 8));
    let response = app
        .oneshot(json_request("/detect/frame", &json!({ "frame": frame })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["has_fire"], false);
    assert_eq!(json["detections"], json!([]));
}

#[tokio::test]
async fn test_frame_missing_data_is_rejected() {
    let detector = Arc::new(StubDetector::new(fire_detections()));
    let (state, _dir) = test_state(detector.clone());
    let app = create_router(state);

    for body in [json!({}), json!({ "frame": "" }), json!({ "frame": "   " })] {
        let response = app
            .clone()
            .oneshot(json_request("/detect/frame", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["code"], "BAD_REQUEST");
    }
    assert_eq!(detector.calls(), 0);
}

#[tokio::test]
async fn test_frame_malformed_body_uses_error_shape() {
    let detector = Arc::new(StubDetector::new(fire_detections()));
    let (state, _dir) = test_state(detector.clone());
    let app = create_router(state);

    let cases = [
        ("application/json", "{\"frame\": "),
        ("application/json", "{\"frame\": 42}"),
        ("text/plain", "{\"frame\": \"abc\"}"),
    ];
    for (content_type, body) in cases {
        let request = Request::builder()
            .method("POST")
            .uri("/detect/frame")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
        let json = body_json(response).await;
        assert_eq!(json["code"], "BAD_REQUEST");
        assert!(json["error"].as_str().unwrap().starts_with("Invalid frame request"));
    }
    assert_eq!(detector.calls(), 0);
}

#[tokio::test]
async fn test_frame_with_undecodable_payload() {
    let (state, _dir) = test_state(Arc::new(StubDetector::new(fire_detections())));
    let app = create_router(state);

    let frame = general_purpose::STANDARD.encode(b"definitely not an image");
    let response = app
        .oneshot(json_request("/detect/frame", &json!({ "frame": frame })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_upload_still_image() {
    let (state, dir) = test_state(Arc::new(StubDetector::new(fire_detections())));
    let app = create_router(state);

    let response = app
        .oneshot(multipart_request(
            "/detect/fire-smoke",
            "file",
            "camera.png",
            &png_bytes(32, 24),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["has_fire"], true);
    assert_eq!(json["total_detections"], 1);
    assert_eq!(json["frames_processed"], 1);
    assert!(json["detections"][0]["confidence"].as_f64().unwrap() > 0.9);

    // Scratch file is gone once the request is answered
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_upload_animation_aggregates_frames() {
    let detector = Arc::new(StubDetector::new(fire_detections()));
    let (state, _dir) = test_state(detector.clone());
    let app = create_router(state);

    let response = app
        .oneshot(multipart_request(
            "/detect/fire-smoke",
            "file",
            "loop.gif",
            &gif_bytes(3),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["frames_processed"], 3);
    assert_eq!(json["total_detections"], 3);
    assert_eq!(json["has_fire"], true);
    assert_eq!(detector.calls(), 3);
}

#[tokio::test]
async fn test_upload_garbage_is_unsupported() {
    let (state, dir) = test_state(Arc::new(StubDetector::new(fire_detections())));
    let app = create_router(state);

    let response = app
        .oneshot(multipart_request(
            "/detect/fire-smoke",
            "file",
            "photo.jpg",
            b"not a jpeg at all",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNSUPPORTED_MEDIA");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_upload_missing_file_field() {
    let (state, _dir) = test_state(Arc::new(StubDetector::new(Vec::new())));
    let app = create_router(state);

    let response = app
        .oneshot(multipart_request(
            "/detect/fire-smoke",
            "attachment",
            "camera.png",
            &png_bytes(4, 4),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_inference_failure() {
    let (state, _dir) = test_state(Arc::new(BrokenDetector));
    let app = create_router(state);

    let response = app
        .oneshot(multipart_request(
            "/detect/fire-smoke",
            "file",
            "camera.png",
            &png_bytes(16, 16),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INFERENCE_FAILED");
}

#[tokio::test]
async fn test_upload_over_limit() {
    let (mut state, _dir) = test_state(Arc::new(StubDetector::new(Vec::new())));
    state.max_upload_bytes = 1024;
    let app = create_router(state);

    let response = app
        .oneshot(multipart_request(
            "/detect/fire-smoke",
            "file",
            "big.png",
            &vec![0u8; 8 * 1024],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_satellite_without_model() {
    let (state, _dir) = test_state(Arc::new(StubDetector::new(Vec::new())));
    let app = create_router(state);

    let response = app
        .oneshot(multipart_request(
            "/detect/satellite-fire",
            "file",
            "tile.png",
            &png_bytes(64, 64),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["code"], "MODEL_UNAVAILABLE");
}
