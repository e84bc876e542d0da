//! Exporter contract.

use async_trait::async_trait;

use crate::data::ResourceMetrics;
use crate::error::Result;

mod memory;

pub use memory::InMemoryExporter;

/// Ships snapshots somewhere. Push exporters own their retry policy.
#[async_trait]
pub trait Exporter: std::fmt::Debug + Send + Sync + 'static {
    async fn export(&self, metrics: ResourceMetrics) -> Result<()>;

    async fn force_flush(&self) -> Result<()> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
