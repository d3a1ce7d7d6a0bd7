//! Append-only sink for webhook records.
//!
//! Handlers hand records to a [`RecordSink`] and move on. The production sink
//! queues them on a channel that a single writer task drains, so every record
//! lands as one complete JSON line, in the order the request bodies finished
//! reading. Write failures are reported through `tracing` and never reach the
//! HTTP response.

pub mod record;

use std::path::PathBuf;

use thiserror::Error;
use tokio::{
    fs::OpenOptions,
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{error, info};

use crate::config::LogTarget;

pub use record::{RecordOptions, WebhookRecord};

/// Failure to open or write the record log.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to open record log {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write record: {0}")]
    Write(#[from] std::io::Error),
}

/// Destination for webhook records.
///
/// `emit` must not block and must not fail: any error is the sink's to report.
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: WebhookRecord);
}

/// Channel-backed sink drained by a background writer task.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<WebhookRecord>,
}

impl ChannelSink {
    /// Open the configured target and start the writer task.
    ///
    /// The returned handle completes once every clone of the sink is dropped
    /// and all queued records have been written.
    pub async fn open(target: &LogTarget) -> Result<(Self, JoinHandle<()>), SinkError> {
        match target {
            LogTarget::Stdout => Ok(Self::spawn(tokio::io::stdout())),
            LogTarget::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await
                    .map_err(|source| SinkError::Open {
                        path: path.clone(),
                        source,
                    })?;
                info!(path = %path.display(), "record_log_opened");
                Ok(Self::spawn(file))
            }
        }
    }

    /// Start a writer task over any async writer.
    pub fn spawn<W>(writer: W) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(drain(rx, writer));
        (Self { tx }, handle)
    }
}

impl RecordSink for ChannelSink {
    fn emit(&self, record: WebhookRecord) {
        if self.tx.send(record).is_err() {
            error!("record_sink_closed");
        }
    }
}

async fn drain<W>(mut rx: mpsc::UnboundedReceiver<WebhookRecord>, mut writer: W)
where
    W: AsyncWrite + Send + Unpin,
{
    while let Some(record) = rx.recv().await {
        if let Err(e) = write_record(&mut writer, &record).await {
            error!(error = %e, path = %record.path, "record_write_failed");
        }
    }

    if let Err(e) = writer.shutdown().await {
        error!(error = %e, "record_log_close_failed");
    }
}

async fn write_record<W>(writer: &mut W, record: &WebhookRecord) -> Result<(), SinkError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
