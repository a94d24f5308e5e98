// Camera snapshot proxy: fetch an upstream image and relay it with permissive CORS

use crate::config::ProxyConfig;
use crate::error::ApiError;
use crate::http::ApiState;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use reqwest::redirect::Policy;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";
const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
}

const MAX_REDIRECTS: usize = 5;

/// Build the shared upstream client.
///
/// Every redirect hop goes through `validate_target` again, so an allowed
/// camera cannot bounce the proxy to a host outside the allow-list.
pub fn build_client(config: &ProxyConfig) -> Result<reqwest::Client, reqwest::Error> {
    let hop_config = config.clone();
    let policy = Policy::custom(move |attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.stop();
        }
        match validate_target(attempt.url().as_str(), &hop_config) {
            Ok(_) => attempt.follow(),
            Err(e) => attempt.error(e),
        }
    });

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(policy)
        .build()
}

/// Check scheme and, when an allow-list is configured, the target host
pub fn validate_target(raw: &str, config: &ProxyConfig) -> Result<Url, ApiError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ApiError::BadRequest(format!("Invalid camera URL: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ApiError::ProxyForbidden(format!(
            "Scheme '{}' is not allowed",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| ApiError::BadRequest("Camera URL has no host".to_string()))?
        .to_ascii_lowercase();

    if !config.allowed_hosts.is_empty()
        && !config
            .allowed_hosts
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&host))
    {
        return Err(ApiError::ProxyForbidden(format!(
            "Host '{}' is not in the proxy allow-list",
            host
        )));
    }

    Ok(url)
}

/// `GET /proxy/camera?url=...`
pub async fn proxy_camera_handler(
    State(state): State<ApiState>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, ApiError> {
    let raw = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing 'url' query parameter".to_string()))?;
    let url = validate_target(&raw, &state.proxy)?;

    info!("Proxying camera request to {}", url);
    let upstream = state.http_client.get(url.clone()).send().await.map_err(|e| {
        warn!("Camera fetch failed for {}: {}", url, e);
        if e.is_redirect() {
            return ApiError::ProxyForbidden(format!("Camera redirect rejected: {}", e));
        }
        let message = if e.is_timeout() {
            format!("Timeout connecting to camera: {}", e)
        } else {
            format!("Cannot connect to camera: {}", e)
        };
        ApiError::UpstreamFetch {
            message,
            status: None,
            timed_out: e.is_timeout(),
        }
    })?;

    let status = upstream.status();
    if !status.is_success() {
        return Err(ApiError::UpstreamFetch {
            message: format!("HTTP {}", status.as_u16()),
            status: Some(status.as_u16()),
            timed_out: false,
        });
    }

    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| HeaderValue::from_bytes(v.as_bytes()).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    // Buffer the whole body so a failed read never produces a partial response
    let body = upstream.bytes().await.map_err(|e| ApiError::UpstreamFetch {
        message: format!("Failed to read camera response: {}", e),
        status: Some(status.as_u16()),
        timed_out: e.is_timeout(),
    })?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ),
            (header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE)),
        ],
        body,
    )
        .into_response())
}
