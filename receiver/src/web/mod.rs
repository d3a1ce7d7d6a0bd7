//! Web server module for receiving signed webhooks.
//!
//! This module provides a small web server that:
//! - Answers a fixed health-check route
//! - Buffers each webhook body exactly as received
//! - Verifies its HMAC-SHA256 signature
//! - Appends one record per delivery to the record sink

pub mod handlers;
pub mod ingest;
pub mod signature;

use axum::Router;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

pub use handlers::{dispatch, health, AppState, EchoResponse};
pub use ingest::{read_request, IngestError, WebhookRequest};
pub use signature::{sign, verify, verify_request, VerificationResult};

/// Build the application router.
///
/// All routing happens in [`dispatch`] so that POST is accepted on any path
/// while the health path stays GET-only. A panic inside a handler becomes a
/// 500 for that request instead of taking the connection down with it.
pub fn router(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
