//! The per-request record appended to the webhook log.

use std::collections::BTreeMap;

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::web::ingest::WebhookRequest;
use crate::web::signature::VerificationResult;

/// Headers whose values never leave the process.
pub const REDACTED_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
];

const REDACTED: &str = "[redacted]";

/// What a record includes beyond the fixed fields.
#[derive(Debug, Clone, Copy)]
pub struct RecordOptions {
    pub log_payload: bool,
    pub body_limit: usize,
}

/// One JSON line per completed webhook request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRecord {
    pub time: String,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub verified: bool,
    pub body_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_truncated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_base64: Option<String>,
}

impl WebhookRecord {
    pub fn new(
        request: &WebhookRequest,
        result: &VerificationResult,
        options: RecordOptions,
    ) -> Self {
        let mut record = WebhookRecord {
            time: format_time(request.received_at),
            method: request.method.to_string(),
            path: request.path.clone(),
            query: request.query.clone(),
            verified: result.verified,
            body_length: result.body_len,
            headers: None,
            body: None,
            body_truncated: None,
            body_base64: None,
        };

        if options.log_payload {
            let (preview, truncated) = body_preview(&request.body, options.body_limit);
            record.headers = Some(redacted_headers(&request.headers));
            record.body = Some(preview);
            record.body_truncated = Some(truncated);
            record.body_base64 = Some(BASE64_STANDARD.encode(&request.body));
        }

        record
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Flatten headers into a name → value map with sensitive values masked.
///
/// Repeated headers are joined with ", ". Names are already lowercase.
pub fn redacted_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();

    for (name, value) in headers {
        let key = name.as_str();
        let shown = if REDACTED_HEADERS.contains(&key) {
            REDACTED.to_string()
        } else {
            String::from_utf8_lossy(value.as_bytes()).into_owned()
        };

        match out.get_mut(key) {
            Some(existing) => {
                if existing.as_str() != REDACTED {
                    existing.push_str(", ");
                    existing.push_str(&shown);
                }
            }
            None => {
                out.insert(key.to_string(), shown);
            }
        }
    }

    out
}

/// Text preview of at most `limit` body bytes.
///
/// Valid UTF-8 is cut on a char boundary; anything else is decoded lossily.
pub fn body_preview(body: &[u8], limit: usize) -> (String, bool) {
    if body.len() <= limit {
        return (String::from_utf8_lossy(body).into_owned(), false);
    }

    let mut cut = limit;
    if let Ok(text) = std::str::from_utf8(body) {
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
    }

    (String::from_utf8_lossy(&body[..cut]).into_owned(), true)
}
