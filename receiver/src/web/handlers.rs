//! Webhook endpoint handlers.
//!
//! Every request goes through [`dispatch`], which decides the outcome:
//! 1. `GET <health path>` answers `ok` without touching the body
//! 2. Anything other than `POST` is rejected with 405
//! 3. `POST` is buffered, verified, recorded and answered with 200 or 401

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::sink::record::redacted_headers;
use crate::sink::{RecordOptions, RecordSink, WebhookRecord};
use crate::web::ingest::{read_request, WebhookRequest};
use crate::web::signature::verify_request;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sink: Arc<dyn RecordSink>,
}

impl AppState {
    pub fn new(config: Config, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            config: Arc::new(config),
            sink,
        }
    }

    fn record_options(&self) -> RecordOptions {
        RecordOptions {
            log_payload: self.config.log_payload,
            body_limit: self.config.log_body_limit,
        }
    }
}

// =============================================================================
// Routing
// =============================================================================

/// Entry point for every request.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let method = request.method().clone();
    let is_health = request.uri().path() == state.config.health_path;

    match method {
        Method::GET if is_health => health().await.into_response(),
        Method::POST => webhook(state, request).await,
        _ => method_not_allowed(&method, request.uri().path()),
    }
}

fn method_not_allowed(method: &Method, path: &str) -> Response {
    info!(method = %method, path = %path, "webhook_method_rejected");
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check endpoint.
pub async fn health() -> &'static str {
    "ok"
}

// =============================================================================
// Webhook
// =============================================================================

/// Payload returned on success when echo mode is enabled.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoResponse {
    pub ok: bool,
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub body_base64: String,
}

impl EchoResponse {
    fn from_request(request: &WebhookRequest) -> Self {
        Self {
            ok: true,
            method: request.method.to_string(),
            path: request.path.clone(),
            headers: redacted_headers(&request.headers),
            body: String::from_utf8_lossy(&request.body).into_owned(),
            body_base64: BASE64_STANDARD.encode(&request.body),
        }
    }
}

/// Signed webhook delivery.
///
/// This handler:
/// 1. Buffers the raw body (400 if the read fails, nothing recorded)
/// 2. Verifies the signature header against the configured secret
/// 3. Emits one record to the sink
/// 4. Returns 200 (empty, or the echo payload) or 401
async fn webhook(state: AppState, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let request = match read_request(request, state.config.max_body_bytes).await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, method = %method, path = %path, "webhook_body_read_failed");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let result = verify_request(&state.config.secret, &request, &state.config.signature_header);

    info!(
        method = %request.method,
        path = %request.path,
        verified = result.verified,
        body_length = result.body_len,
        "webhook_received"
    );

    state
        .sink
        .emit(WebhookRecord::new(&request, &result, state.record_options()));

    if !result.verified {
        warn!(path = %request.path, "webhook_signature_invalid");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    if state.config.echo_payload {
        (StatusCode::OK, Json(EchoResponse::from_request(&request))).into_response()
    } else {
        StatusCode::OK.into_response()
    }
}
