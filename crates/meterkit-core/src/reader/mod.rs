//! Metric readers.
//!
//! A reader owns the collection schedule. The provider hands each reader its
//! own [`Pipeline`] at build time; the reader decides when to run a pass and
//! what to do with the snapshot.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::temporality::TemporalitySelector;

mod manual;

pub use manual::{ManualReader, ManualReaderBuilder, ReaderState};

#[async_trait]
pub trait MetricReader: std::fmt::Debug + Send + Sync + 'static {
    /// Attach the pipeline built for this reader. A reader serves one
    /// provider only; a second registration fails with `DuplicateRegistration`.
    fn register_pipeline(&self, pipeline: Arc<Pipeline>) -> Result<()>;

    /// Temporality per instrument kind, fixed for the reader's lifetime.
    fn temporality_selector(&self) -> Arc<dyn TemporalitySelector>;

    /// Run a pass now and hand it to the attached exporter, if any.
    async fn force_flush(&self) -> Result<()>;

    /// Final pass, then stop. Later collections fail with `Closed`.
    async fn shutdown(&self) -> Result<()>;
}
