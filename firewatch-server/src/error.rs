// HTTP error type and its JSON rendering

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use firewatch_eye::VisionError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    UnsupportedMedia(String),

    #[error("{0}")]
    Inference(String),

    #[error("{0}")]
    ModelUnavailable(String),

    #[error("Failed to fetch camera stream: {message}")]
    UpstreamFetch {
        message: String,
        status: Option<u16>,
        timed_out: bool,
    },

    #[error("{0}")]
    ProxyForbidden(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Inference(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::UpstreamFetch { timed_out: true, .. } => StatusCode::GATEWAY_TIMEOUT,
            ApiError::UpstreamFetch { .. } => StatusCode::BAD_GATEWAY,
            ApiError::ProxyForbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::UnsupportedMedia(_) => "UNSUPPORTED_MEDIA",
            ApiError::Inference(_) => "INFERENCE_FAILED",
            ApiError::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            ApiError::UpstreamFetch { timed_out: true, .. } => "UPSTREAM_TIMEOUT",
            ApiError::UpstreamFetch { .. } => "UPSTREAM_FETCH_ERROR",
            ApiError::ProxyForbidden(_) => "PROXY_FORBIDDEN",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show a client. Internal details only go to the log.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn from_multipart(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge("Upload exceeds the configured size limit".to_string())
        } else {
            ApiError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
        }
    }
}

impl From<VisionError> for ApiError {
    fn from(err: VisionError) -> Self {
        match err {
            VisionError::ModelUnavailable(msg) => ApiError::ModelUnavailable(msg),
            VisionError::UnsupportedMedia(msg) | VisionError::FrameDecode(msg) => {
                ApiError::UnsupportedMedia(msg)
            }
            VisionError::Image(e) => ApiError::UnsupportedMedia(e.to_string()),
            VisionError::Inference(msg) => ApiError::Inference(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.public_message();
        let upstream_status = match &self {
            ApiError::UpstreamFetch { status, .. } => *status,
            _ => None,
        };

        let body = Json(ErrorResponse {
            error: message,
            code: self.code().to_string(),
            upstream_status,
        });
        (status, body).into_response()
    }
}
