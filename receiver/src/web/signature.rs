//! Webhook signature verification.
//!
//! The sender signs each delivery with HMAC-SHA256 over the raw request body,
//! keyed by the shared secret, and sends the digest Base64-encoded (standard
//! alphabet, padded) in the signature header.
//!
//! The digest MUST be computed over the bytes exactly as received. Decoding and
//! re-serializing the body (for example as JSON) changes the bytes and breaks
//! the signature.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::config::SharedSecret;
use crate::web::ingest::WebhookRequest;

type HmacSha256 = Hmac<Sha256>;

/// Outcome of verifying one request.
///
/// `body_len` is diagnostic only and carries no security meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationResult {
    pub verified: bool,
    pub body_len: usize,
}

/// Compute the Base64-encoded HMAC-SHA256 of `raw_body` keyed by `secret`.
///
/// Returns `None` only if the MAC cannot be keyed, which HMAC never refuses in
/// practice.
pub fn sign(secret: &[u8], raw_body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(raw_body);
    Some(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

/// Verify a supplied signature against the raw body.
///
/// # Arguments
///
/// * `secret` - The shared signing secret
/// * `raw_body` - The request body exactly as received
/// * `supplied` - The signature header value, empty if the header was absent
///
/// # Returns
///
/// `true` only if the secret is non-empty and `supplied` equals the Base64
/// HMAC-SHA256 of `raw_body`. An empty secret or empty signature always fails.
///
/// Pure: no I/O, same inputs always give the same answer.
pub fn verify(secret: &[u8], raw_body: &[u8], supplied: &str) -> bool {
    if secret.is_empty() || supplied.is_empty() {
        return false;
    }

    let expected = match sign(secret, raw_body) {
        Some(sig) => sig,
        None => return false,
    };

    constant_time_compare(expected.as_bytes(), supplied.as_bytes())
}

/// Verify a buffered request using the configured secret and header name.
pub fn verify_request(
    secret: &SharedSecret,
    request: &WebhookRequest,
    signature_header: &str,
) -> VerificationResult {
    let supplied = request.header(signature_header);

    if !secret.is_configured() {
        warn!(path = %request.path, "webhook_secret_not_configured");
    } else if supplied.is_empty() {
        debug!(path = %request.path, header = signature_header, "webhook_signature_missing");
    }

    VerificationResult {
        verified: verify(secret.as_bytes(), &request.body, supplied),
        body_len: request.body.len(),
    }
}

/// Constant-time byte comparison to prevent timing attacks.
///
/// Lengths are compared first; equal-length inputs are always scanned in full.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}
