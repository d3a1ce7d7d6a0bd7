//! Configuration module for environment variable parsing.
//!
//! Everything is read once at startup into an immutable [`Config`] that the
//! router carries in its state. Nothing reads the environment after that.

use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

/// Default header carrying the Base64 HMAC-SHA256 signature.
pub const DEFAULT_SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Default health-check route.
pub const DEFAULT_HEALTH_PATH: &str = "/up";

/// Default record log file.
pub const DEFAULT_LOG_FILE: &str = "webhooks.log";

/// Shared signing secret.
///
/// An empty secret is a valid value meaning "not configured": every
/// verification against it fails.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_configured(&self) -> bool {
        !self.0.is_empty()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_configured() {
            f.write_str("SharedSecret(<redacted>)")
        } else {
            f.write_str("SharedSecret(<unset>)")
        }
    }
}

/// Where webhook records are appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    File(PathBuf),
}

impl LogTarget {
    fn parse(raw: &str) -> Self {
        match raw.trim() {
            "-" => LogTarget::Stdout,
            "" => LogTarget::File(PathBuf::from(DEFAULT_LOG_FILE)),
            path => LogTarget::File(PathBuf::from(path)),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the listener to
    pub host: IpAddr,

    /// Port for the web server to listen on
    pub port: u16,

    /// Secret shared with the webhook sender
    pub secret: SharedSecret,

    /// Header carrying the signature (matched case-insensitively)
    pub signature_header: String,

    /// Route answered with a plain `ok`
    pub health_path: String,

    /// Destination of webhook records
    pub log_target: LogTarget,

    /// Include redacted headers and the body in webhook records
    pub log_payload: bool,

    /// Maximum number of body bytes in a record's text preview
    pub log_body_limit: usize,

    /// Bodies larger than this fail to read and are answered with 400
    pub max_body_bytes: usize,

    /// Echo the received payload in successful responses (debug only)
    pub echo_payload: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            secret: SharedSecret::default(),
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            log_target: LogTarget::File(PathBuf::from(DEFAULT_LOG_FILE)),
            log_payload: false,
            log_body_limit: 4096,
            max_body_bytes: 2 * 1024 * 1024,
            echo_payload: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            host: parse_var("HOST", defaults.host),

            port: parse_var("PORT", defaults.port),

            secret: SharedSecret::new(env::var("WEBHOOK_SECRET").unwrap_or_default()),

            signature_header: env::var("SIGNATURE_HEADER")
                .ok()
                .map(|v| v.trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.signature_header),

            health_path: env::var("HEALTH_PATH")
                .ok()
                .and_then(|v| normalize_path(&v))
                .unwrap_or(defaults.health_path),

            log_target: env::var("LOG_FILE")
                .map(|v| LogTarget::parse(&v))
                .unwrap_or(defaults.log_target),

            log_payload: parse_bool("LOG_PAYLOAD", defaults.log_payload),

            log_body_limit: parse_var("LOG_BODY_LIMIT", defaults.log_body_limit),

            max_body_bytes: parse_var("MAX_BODY_BYTES", defaults.max_body_bytes),

            echo_payload: parse_bool("ECHO_PAYLOAD", defaults.echo_payload),
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = SharedSecret::new(secret);
        self
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Parse a variable with `FromStr`, warning and falling back on bad input.
fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

/// Parse a boolean flag such as "true", "1", "yes" or "off".
fn parse_bool(name: &str, default: bool) -> bool {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}

/// Ensure a route starts with a single leading slash.
fn normalize_path(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('/') {
        Some(trimmed.to_string())
    } else {
        Some(format!("/{}", trimmed))
    }
}
