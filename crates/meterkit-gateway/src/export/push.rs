//! Push exporter: one JSON line per snapshot, retried with backoff.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::Instant;

use meterkit_core::error::{MeterError, Result};
use meterkit_core::{BackoffPolicy, Exporter, ResourceMetrics};

/// Delivery of one encoded batch. Implementations do not retry.
#[async_trait]
pub trait Transport: std::fmt::Debug + Send + Sync + 'static {
    async fn send(&self, payload: Bytes) -> Result<()>;
}

/// Connects per batch and writes the payload.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    endpoint: String,
}

impl TcpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, payload: Bytes) -> Result<()> {
        let mut stream = TcpStream::connect(&self.endpoint)
            .await
            .map_err(|e| MeterError::Export(format!("connect {}: {e}", self.endpoint)))?;
        stream
            .write_all(&payload)
            .await
            .map_err(|e| MeterError::Export(format!("write {}: {e}", self.endpoint)))?;
        stream
            .shutdown()
            .await
            .map_err(|e| MeterError::Export(format!("close {}: {e}", self.endpoint)))
    }
}

#[derive(Debug)]
pub struct PushExporter<T: Transport = TcpTransport> {
    transport: T,
    policy: BackoffPolicy,
    closed: AtomicBool,
}

impl<T: Transport> PushExporter<T> {
    pub fn new(transport: T, policy: BackoffPolicy) -> Self {
        Self {
            transport,
            policy,
            closed: AtomicBool::new(false),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

fn encode(metrics: &ResourceMetrics) -> Result<Bytes> {
    let json = serde_json::to_vec(metrics)
        .map_err(|e| MeterError::Export(format!("encode snapshot: {e}")))?;
    let mut buf = BytesMut::with_capacity(json.len() + 1);
    buf.put_slice(&json);
    buf.put_u8(b'\n');
    Ok(buf.freeze())
}

#[async_trait]
impl<T: Transport> Exporter for PushExporter<T> {
    async fn export(&self, metrics: ResourceMetrics) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MeterError::Closed);
        }
        let payload = encode(&metrics)?;

        let started = Instant::now();
        let mut backoff = self.policy.start();
        let mut attempt = 1u32;
        loop {
            let err = match self.transport.send(payload.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            match backoff.next_delay(started.elapsed()) {
                Some(delay) => {
                    tracing::debug!(attempt, ?delay, error = %err, "push export failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => {
                    tracing::warn!(
                        attempts = attempt,
                        elapsed = ?started.elapsed(),
                        error = %err,
                        "dropping metrics batch after retry budget"
                    );
                    return Err(MeterError::Export(format!(
                        "gave up after {attempt} attempts: {err}"
                    )));
                }
            }
        }
    }

    async fn shutdown(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
