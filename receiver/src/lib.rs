//! Webhook Receiver - signed webhook ingestion.
//!
//! Receives webhook callbacks over HTTP, verifies the Base64 HMAC-SHA256
//! signature computed over the raw body with a shared secret, and appends one
//! JSON record per delivery to a log.
//!
//! ## Architecture
//!
//! ```text
//! Request → ingest (buffer body) → signature::verify → status → sink (record)
//! ```

pub mod config;
pub mod sink;
pub mod web;

// Re-export commonly used types
pub use config::{Config, LogTarget, SharedSecret};
pub use sink::{ChannelSink, RecordSink, WebhookRecord};
pub use web::{router, sign, verify, AppState};
