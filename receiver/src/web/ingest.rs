//! Read an inbound request to completion.
//!
//! Verification needs the exact bytes the sender signed, so the body is
//! collected into one contiguous buffer before anything looks at it. A read
//! either yields the whole body or fails; a partial body is never returned.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header::CONTENT_LENGTH, HeaderMap, Method},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Transport-level failure while buffering a request body.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Declared `Content-Length` exceeds the configured maximum.
    #[error("body of {length} bytes exceeds limit of {limit} bytes")]
    TooLarge { length: u64, limit: usize },

    /// The body stream failed or exceeded the limit while reading.
    #[error("failed to read request body: {0}")]
    BodyRead(#[source] axum::Error),
}

/// A fully buffered webhook delivery.
///
/// Built once when the body read completes and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub received_at: DateTime<Utc>,
}

impl WebhookRequest {
    /// Case-insensitive header lookup.
    ///
    /// A missing header, or one whose value is not valid UTF-8, reads as "".
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }
}

/// Buffer the request body and capture the request as a [`WebhookRequest`].
pub async fn read_request(request: Request, limit: usize) -> Result<WebhookRequest, IngestError> {
    let (parts, body) = request.into_parts();

    if let Some(length) = declared_length(&parts.headers) {
        if length > limit as u64 {
            return Err(IngestError::TooLarge { length, limit });
        }
    }

    let body = read_body(body, limit).await?;

    Ok(WebhookRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
        received_at: Utc::now(),
    })
}

async fn read_body(body: Body, limit: usize) -> Result<Bytes, IngestError> {
    to_bytes(body, limit).await.map_err(IngestError::BodyRead)
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
