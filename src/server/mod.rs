//! HTTP surface for the gate.
//!
//! A thin axum layer: handlers translate requests into [`RequestMeta`],
//! hand them to the gate, and translate verdicts back into responses with
//! rate-limit headers. No policy lives here.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::gate::{GateVerdict, RequestGate, RequestMeta};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<RequestGate>,
}

/// Build the application router.
pub fn router(gate: Arc<RequestGate>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/webhooks/:source", post(webhook))
        .route("/recovery/nonce", get(issue_nonce))
        .route("/recovery/validate", post(validate_recovery))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { gate })
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn webhook(
    State(state): State<AppState>,
    Path(source): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let meta = request_meta(&headers, body);
    let verdict = state.gate.evaluate_webhook(&source, &meta);
    verdict_response(verdict)
}

async fn validate_recovery(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let meta = request_meta(&headers, body);
    let verdict = state.gate.evaluate_recovery(&meta);
    verdict_response(verdict)
}

async fn issue_nonce(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let meta = request_meta(&headers, Bytes::new());
    let verdict = state.gate.issue_nonce(&meta);
    verdict_response(verdict)
}

/// Flatten an axum request into the transport-neutral form the gate takes.
fn request_meta(headers: &HeaderMap, body: Bytes) -> RequestMeta {
    let mut map = HashMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            map.insert(name.as_str().to_ascii_lowercase(), value.to_string());
        }
    }

    let content_type = map.get("content-type").cloned();
    let bearer = map
        .get("authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    let mut meta = RequestMeta::new(body.to_vec()).with_content_type(content_type.as_deref());
    meta.headers = map;
    if let Some(token) = bearer {
        meta = meta.with_bearer(&token);
    }
    meta
}

/// Translate a verdict into an HTTP response with rate-limit headers.
fn verdict_response(verdict: GateVerdict) -> Response {
    let status =
        StatusCode::from_u16(verdict.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(verdict.body)).into_response();
    let headers = response.headers_mut();

    if let Some(rate) = verdict.rate {
        insert_numeric(headers, "x-ratelimit-limit", rate.limit as u64);
        insert_numeric(headers, "x-ratelimit-remaining", rate.remaining as u64);
        // Reset is reported as epoch seconds, rounded up.
        insert_numeric(headers, "x-ratelimit-reset", (rate.reset_at_ms + 999) / 1000);
    }
    if let Some(retry) = verdict.retry_after_secs {
        insert_numeric(headers, header::RETRY_AFTER.as_str(), retry);
    }

    response
}

fn insert_numeric(headers: &mut HeaderMap, name: &'static str, value: u64) {
    match HeaderValue::from_str(&value.to_string()) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(e) => error!(header = name, error = %e, "Failed to encode response header"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderName;

    #[test]
    fn test_request_meta_lowercases_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-webhook-signature"),
            HeaderValue::from_static("abc"),
        );
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let meta = request_meta(&headers, Bytes::from_static(b"{}"));
        assert_eq!(meta.headers.get("x-webhook-signature").map(String::as_str), Some("abc"));
        assert!(meta.is_json());
        assert!(meta.bearer.is_none());
    }

    #[test]
    fn test_request_meta_extracts_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer 0xabc:sig:msg:123"),
        );

        let meta = request_meta(&headers, Bytes::new());
        assert_eq!(meta.bearer.as_deref(), Some("0xabc:sig:msg:123"));
    }
}
