//! Webhook Receiver - signed webhook endpoint.
//!
//! `serve` (the default) runs the HTTP server. `sign` prints the signature a
//! sender would attach to a payload, and `generate-secret` prints a fresh
//! random secret; both are for setting up and testing an integration by hand.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use clap::{Parser, Subcommand};
use rand::RngCore;
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use webhook_receiver::{router, sign, AppState, ChannelSink, Config, LogTarget};

#[derive(Parser)]
#[command(name = "webhook-receiver", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook server (configured from the environment)
    Serve,
    /// Print the Base64 HMAC-SHA256 signature of a payload
    Sign {
        /// Shared secret to sign with
        #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,
        /// Payload file; reads stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Print a new random 32-byte secret, Base64-encoded
    GenerateSecret,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Sign { secret, file } => print_signature(&secret, file),
        Command::GenerateSecret => {
            let mut secret = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut secret);
            println!("{}", BASE64_STANDARD.encode(secret));
            Ok(())
        }
    }
}

fn print_signature(secret: &str, file: Option<PathBuf>) -> Result<()> {
    let payload = match file {
        Some(path) => std::fs::read(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let signature = sign(secret.as_bytes(), &payload).context("Failed to key HMAC")?;
    println!("{}", signature);
    Ok(())
}

async fn serve() -> Result<()> {
    // Initialize structured JSON logging on stderr; stdout may carry records
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_writer(std::io::stderr),
        )
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        bind = %config.bind_addr(),
        secret_configured = config.secret.is_configured(),
        signature_header = %config.signature_header,
        health_path = %config.health_path,
        log_target = ?config.log_target,
        log_payload = config.log_payload,
        echo_payload = config.echo_payload,
        "config_loaded"
    );

    if !config.secret.is_configured() {
        warn!("WEBHOOK_SECRET not set; every webhook will be rejected");
    }
    if config.echo_payload {
        warn!("echo mode enabled; successful responses include the received payload");
    }

    // Open the record sink, falling back to stdout so the server still starts
    let (sink, writer) = match ChannelSink::open(&config.log_target).await {
        Ok(opened) => opened,
        Err(e) => {
            error!(error = %e, "record_log_open_failed");
            ChannelSink::open(&LogTarget::Stdout)
                .await
                .context("Failed to open stdout record sink")?
        }
    };

    let addr = config.bind_addr();
    let state = AppState::new(config, Arc::new(sink));
    let app = router(state);

    // Bind to address
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // The router (and with it the last sink handle) is gone; wait for the
    // writer to flush what is queued.
    if let Err(e) = writer.await {
        error!(error = %e, "record_writer_failed");
    }

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
