//! Downstream sinks. Forwarders and metric-exporter sinks remain external
//! collaborators; the two concrete sinks here are the minimal writers the
//! fan-out dispatcher needs to have
//! something real to drive: an injectable, testable recorder of pipeline
//! activity rather than a stub.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

use crate::record::NormalizedRecord;

/// A downstream consumer of normalized records. Implementations may hold
/// their own internal buffering/backpressure; `send` blocking is how the
/// orchestrator's mandatory backpressure on dispatch propagates.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn send(&self, record: NormalizedRecord) -> anyhow::Result<()>;

    /// A short label used in metrics and logs, e.g. "text:/var/log/dns.log".
    fn label(&self) -> &str;
}

/// Line-oriented text sink: one human-readable line per record.
pub struct TextSink<W> {
    label: String,
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> TextSink<W> {
    pub fn new(label: impl Into<String>, writer: W) -> Self {
        Self { label: label.into(), writer: Mutex::new(writer) }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Sink for TextSink<W> {
    async fn send(&self, record: NormalizedRecord) -> anyhow::Result<()> {
        let line = format!(
            "{} {} {} id={} qname={} qtype={} rcode={} latency={}\n",
            record.time.ts_rfc3339_utc_nano,
            record.dns.operation,
            record.dns.direction,
            record.dns.id,
            record.dns.qname,
            record.dns.qtype,
            record.dns.rcode,
            record.dns.latency_str,
        );
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Newline-delimited JSON sink: one `NormalizedRecord` object per line.
pub struct JsonSink<W> {
    label: String,
    writer: Mutex<W>,
}

impl<W: AsyncWrite + Unpin + Send> JsonSink<W> {
    pub fn new(label: impl Into<String>, writer: W) -> Self {
        Self { label: label.into(), writer: Mutex::new(writer) }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Sink for JsonSink<W> {
    async fn send(&self, record: NormalizedRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Wraps a concrete sink behind its own bounded egress channel, with a
/// capacity configured per sink. A background task drains the channel
/// into the inner sink; `send` here is what blocks under backpressure
/// when that channel fills.
pub struct BoundedSink {
    label: String,
    tx: mpsc::Sender<NormalizedRecord>,
}

impl BoundedSink {
    pub fn spawn(inner: Arc<dyn Sink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel(capacity);
        let label = inner.label().to_string();
        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = inner.send(record).await {
                    warn!(sink = inner.label(), error = %e, "sink write failed");
                }
            }
        });
        Self { label, tx }
    }
}

#[async_trait]
impl Sink for BoundedSink {
    async fn send(&self, record: NormalizedRecord) -> anyhow::Result<()> {
        self.tx
            .send(record)
            .await
            .map_err(|_| anyhow::anyhow!("sink '{}' channel closed", self.label))
    }

    fn label(&self) -> &str {
        &self.label
    }
}
