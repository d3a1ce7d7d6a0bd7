//! HTTP-level tests for the webhook router.
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot` and an
//! in-memory record sink, covering the health route, method gating, signature
//! outcomes and body read failures.

use std::io;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::{
    body::{Body, Bytes},
    http::{header::CONTENT_LENGTH, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;
use webhook_receiver::{router, sign, AppState, Config, RecordSink, WebhookRecord};

const SECRET: &str = "topsecret";
const BODY: &str = r#"{"event":"paid"}"#;
const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Collects records in memory instead of writing them out.
#[derive(Default)]
struct MemorySink {
    records: Mutex<Vec<WebhookRecord>>,
}

impl MemorySink {
    fn records(&self) -> Vec<WebhookRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl RecordSink for MemorySink {
    fn emit(&self, record: WebhookRecord) {
        self.records.lock().unwrap().push(record);
    }
}

/// Sink that fails hard on every record.
struct PanickingSink;

impl RecordSink for PanickingSink {
    fn emit(&self, _record: WebhookRecord) {
        panic!("record sink exploded");
    }
}

fn app_with(config: Config) -> (Router, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::default());
    let app = router(AppState::new(config, sink.clone()));
    (app, sink)
}

fn app() -> (Router, Arc<MemorySink>) {
    app_with(Config::default().with_secret(SECRET))
}

fn signed_post(path: &str, body: &'static str, signature: Option<&str>) -> Result<Request<Body>> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header("content-type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header(SIGNATURE_HEADER, sig);
    }
    Ok(builder.body(Body::from(body))?)
}

async fn body_bytes(response: axum::response::Response) -> Result<Bytes> {
    Ok(response.into_body().collect().await?.to_bytes())
}

#[tokio::test]
async fn valid_signature_is_accepted() -> Result<()> {
    let (app, sink) = app();
    let signature = sign(SECRET.as_bytes(), BODY.as_bytes()).unwrap();
    assert_eq!(signature, "TqSO8AZJcmqvaFpMSPo7vcyXEd4zyWhfNFl+DYGraR4=");

    let response = app
        .oneshot(signed_post("/webhooks/payments", BODY, Some(&signature))?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await?.is_empty());

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].method, "POST");
    assert_eq!(records[0].path, "/webhooks/payments");
    assert_eq!(records[0].query, None);
    assert!(records[0].verified);
    assert_eq!(records[0].body_length, BODY.len());
    assert!(records[0].body.is_none());
    Ok(())
}

#[tokio::test]
async fn query_string_is_recorded() -> Result<()> {
    let (app, sink) = app();
    let signature = sign(SECRET.as_bytes(), BODY.as_bytes()).unwrap();

    let response = app
        .oneshot(signed_post("/webhooks?attempt=2", BODY, Some(&signature))?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let records = sink.records();
    assert_eq!(records[0].path, "/webhooks");
    assert_eq!(records[0].query.as_deref(), Some("attempt=2"));
    Ok(())
}

#[tokio::test]
async fn wrong_signature_is_rejected() -> Result<()> {
    let (app, sink) = app();

    let response = app.oneshot(signed_post("/", BODY, Some("AAAA"))?).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_bytes(response).await?.is_empty());
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].verified);
    Ok(())
}

#[tokio::test]
async fn missing_signature_is_rejected() -> Result<()> {
    let (app, sink) = app();

    let response = app.oneshot(signed_post("/", BODY, None)?).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(sink.records().len(), 1);
    Ok(())
}

#[tokio::test]
async fn signature_header_name_is_case_insensitive() -> Result<()> {
    let (app, _sink) = app();
    let signature = sign(SECRET.as_bytes(), BODY.as_bytes()).unwrap();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header("X-Webhook-Signature", signature)
        .body(Body::from(BODY))?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn empty_body_with_valid_signature_is_accepted() -> Result<()> {
    let (app, sink) = app();
    let signature = sign(SECRET.as_bytes(), b"").unwrap();

    let response = app.oneshot(signed_post("/", "", Some(&signature))?).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].body_length, 0);
    assert!(records[0].verified);
    Ok(())
}

#[tokio::test]
async fn missing_secret_fails_closed() -> Result<()> {
    let (app, sink) = app_with(Config::default());
    let signature = sign(b"", BODY.as_bytes()).unwrap();

    let response = app
        .clone()
        .oneshot(signed_post("/", BODY, Some(&signature))?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Health stays up without a secret
    let health = Request::builder().uri("/up").body(Body::empty())?;
    let response = app.oneshot(health).await?;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(sink.records().len(), 1);
    Ok(())
}

#[tokio::test]
async fn health_check_bypasses_verification() -> Result<()> {
    let (app, sink) = app();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/up")
        .body(Body::from("ignored"))?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_LENGTH).unwrap().to_str()?,
        "2"
    );
    assert_eq!(&body_bytes(response).await?[..], b"ok");
    assert!(sink.records().is_empty());
    Ok(())
}

#[tokio::test]
async fn custom_health_path() -> Result<()> {
    let config = Config {
        health_path: "/".to_string(),
        ..Config::default().with_secret(SECRET)
    };
    let (app, sink) = app_with(config);

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/up").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    assert!(sink.records().is_empty());
    Ok(())
}

#[tokio::test]
async fn post_to_health_path_is_verified() -> Result<()> {
    let (app, sink) = app();

    let response = app.oneshot(signed_post("/up", BODY, None)?).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(sink.records().len(), 1);
    Ok(())
}

#[tokio::test]
async fn other_methods_are_rejected() -> Result<()> {
    let (app, sink) = app();

    for method in [
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
        Method::HEAD,
        Method::OPTIONS,
    ] {
        for path in ["/webhooks", "/up"] {
            let request = Request::builder()
                .method(method.clone())
                .uri(path)
                .body(Body::from(BODY))?;
            let response = app.clone().oneshot(request).await?;

            assert_eq!(
                response.status(),
                StatusCode::METHOD_NOT_ALLOWED,
                "{method} {path}"
            );
            assert!(body_bytes(response).await?.is_empty());
        }
    }

    // GET anywhere but the health path
    let request = Request::builder().uri("/webhooks").body(Body::empty())?;
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    assert!(sink.records().is_empty());
    Ok(())
}

#[tokio::test]
async fn body_read_error_is_bad_request() -> Result<()> {
    let (app, sink) = app();

    let chunks: Vec<Result<Bytes, io::Error>> = vec![
        Ok(Bytes::from_static(b"{\"event\":")),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
    ];
    let request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .body(Body::from_stream(futures::stream::iter(chunks)))?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_bytes(response).await?.is_empty());
    assert!(sink.records().is_empty());
    Ok(())
}

#[tokio::test]
async fn oversized_body_is_bad_request() -> Result<()> {
    let config = Config {
        max_body_bytes: 8,
        ..Config::default().with_secret(SECRET)
    };
    let (app, sink) = app_with(config);
    let signature = sign(SECRET.as_bytes(), BODY.as_bytes()).unwrap();

    let response = app
        .oneshot(signed_post("/", BODY, Some(&signature))?)
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(sink.records().is_empty());
    Ok(())
}

#[tokio::test]
async fn echo_mode_returns_redacted_payload() -> Result<()> {
    let config = Config {
        echo_payload: true,
        ..Config::default().with_secret(SECRET)
    };
    let (app, _sink) = app_with(config);
    let signature = sign(SECRET.as_bytes(), BODY.as_bytes()).unwrap();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/hooks")
        .header(SIGNATURE_HEADER, &signature)
        .header("authorization", "Bearer hunter2")
        .body(Body::from(BODY))?;
    let response = app.oneshot(request).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let echo: serde_json::Value = serde_json::from_slice(&body_bytes(response).await?)?;
    assert_eq!(echo["ok"], true);
    assert_eq!(echo["path"], "/hooks");
    assert_eq!(echo["body"], BODY);
    assert_eq!(echo["headers"]["authorization"], "[redacted]");
    assert_eq!(echo["headers"][SIGNATURE_HEADER], signature.as_str());
    Ok(())
}

#[tokio::test]
async fn echo_mode_does_not_echo_rejected_requests() -> Result<()> {
    let config = Config {
        echo_payload: true,
        ..Config::default().with_secret(SECRET)
    };
    let (app, _sink) = app_with(config);

    let response = app.oneshot(signed_post("/", BODY, Some("AAAA"))?).await?;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_bytes(response).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn payload_logging_records_body_and_redacts_headers() -> Result<()> {
    let config = Config {
        log_payload: true,
        log_body_limit: 8,
        ..Config::default().with_secret(SECRET)
    };
    let (app, sink) = app_with(config);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header("cookie", "session=abc")
        .body(Body::from(BODY))?;
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.body.as_deref(), Some(r#"{"event""#));
    assert_eq!(record.body_truncated, Some(true));
    assert_eq!(record.body_length, BODY.len());
    assert_eq!(
        record.headers.as_ref().unwrap()["cookie"],
        "[redacted]"
    );
    Ok(())
}

#[tokio::test]
async fn custom_signature_header() -> Result<()> {
    let config = Config {
        signature_header: "x-vendor-hmac-sha256".to_string(),
        ..Config::default().with_secret(SECRET)
    };
    let (app, _sink) = app_with(config);
    let signature = sign(SECRET.as_bytes(), BODY.as_bytes()).unwrap();

    // The default header is no longer consulted
    let response = app
        .clone()
        .oneshot(signed_post("/", BODY, Some(&signature))?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/")
        .header("X-Vendor-Hmac-Sha256", &signature)
        .body(Body::from(BODY))?;
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn handler_panic_degrades_to_server_error() -> Result<()> {
    let state = AppState::new(Config::default().with_secret(SECRET), Arc::new(PanickingSink));
    let app = router(state);
    let signature = sign(SECRET.as_bytes(), BODY.as_bytes()).unwrap();

    let response = app
        .clone()
        .oneshot(signed_post("/", BODY, Some(&signature))?)
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // The router keeps serving after the fault
    let health = Request::builder().uri("/up").body(Body::empty())?;
    let response = app.oneshot(health).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}
