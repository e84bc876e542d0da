use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;

use crate::sync::lock;
use crate::error::{MeterError, Result};
use crate::export::Exporter;
use crate::pipeline::{Collection, Pipeline};
use crate::temporality::{CumulativeOnly, TemporalitySelector};

use super::MetricReader;

/// Reader lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Collecting,
    ShuttingDown,
    Stopped,
}

struct Inner {
    selector: Arc<dyn TemporalitySelector>,
    pipeline: OnceLock<Arc<Pipeline>>,
    state: Mutex<ReaderState>,
    /// Held for the duration of a pass; passes never overlap.
    pass: Mutex<()>,
    exporter: Option<Arc<dyn Exporter>>,
}

/// Reader driven by explicit `collect()` calls.
///
/// Clones share state, so a clone can be kept for collecting after the
/// first one has been handed to `MeterProviderBuilder::with_reader`.
#[derive(Clone)]
pub struct ManualReader {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ManualReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualReader")
            .field("selector", &self.inner.selector)
            .field("state", &self.state())
            .field("exporter", &self.inner.exporter)
            .finish()
    }
}

impl Default for ManualReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualReader {
    /// Cumulative reader without an exporter.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ManualReaderBuilder {
        ManualReaderBuilder::default()
    }

    pub fn state(&self) -> ReaderState {
        *lock(&self.inner.state)
    }

    fn pipeline(&self) -> Result<&Arc<Pipeline>> {
        self.inner.pipeline.get().ok_or(MeterError::ReaderNotRegistered)
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state() {
            ReaderState::ShuttingDown | ReaderState::Stopped => Err(MeterError::Closed),
            ReaderState::Idle | ReaderState::Collecting => Ok(()),
        }
    }

    /// Run one collection pass. Concurrent callers are serialized and each
    /// receives its own complete snapshot.
    pub fn collect(&self) -> Result<Collection> {
        let pipeline = self.pipeline()?;
        self.ensure_open()?;

        let _pass = lock(&self.inner.pass);
        // shutdown may have started while we waited for the previous pass
        {
            let mut state = lock(&self.inner.state);
            if matches!(*state, ReaderState::ShuttingDown | ReaderState::Stopped) {
                return Err(MeterError::Closed);
            }
            *state = ReaderState::Collecting;
        }

        let collection = pipeline.produce();

        let mut state = lock(&self.inner.state);
        if *state == ReaderState::Collecting {
            *state = ReaderState::Idle;
        }
        Ok(collection)
    }

    /// Stop accepting collections, wait for an in-flight pass, then run the
    /// final pass and return its snapshot.
    pub fn shutdown_collect(&self) -> Result<Collection> {
        {
            let mut state = lock(&self.inner.state);
            if matches!(*state, ReaderState::ShuttingDown | ReaderState::Stopped) {
                return Err(MeterError::Closed);
            }
            *state = ReaderState::ShuttingDown;
        }

        let _pass = lock(&self.inner.pass);
        let result = self.pipeline().map(|p| p.produce());
        *lock(&self.inner.state) = ReaderState::Stopped;
        result
    }

    /// Export the snapshot, then report the first observer fault of the
    /// pass (if any) to the caller.
    async fn export(&self, collection: Collection) -> Result<()> {
        let (metrics, partial) = collection.into_parts();
        if let Some(exporter) = &self.inner.exporter {
            exporter.export(metrics).await?;
        }
        match partial {
            Some(e) => {
                tracing::warn!(error = %e, "collection completed with observer errors");
                Err(e)
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MetricReader for ManualReader {
    fn register_pipeline(&self, pipeline: Arc<Pipeline>) -> Result<()> {
        self.inner
            .pipeline
            .set(pipeline)
            .map_err(|_| MeterError::DuplicateRegistration)
    }

    fn temporality_selector(&self) -> Arc<dyn TemporalitySelector> {
        Arc::clone(&self.inner.selector)
    }

    async fn force_flush(&self) -> Result<()> {
        if self.inner.exporter.is_none() {
            return self.ensure_open();
        }
        let collection = self.collect()?;
        let exported = self.export(collection).await;
        let flushed = match &self.inner.exporter {
            Some(exporter) => exporter.force_flush().await,
            None => Ok(()),
        };
        exported.and(flushed)
    }

    async fn shutdown(&self) -> Result<()> {
        let collection = self.shutdown_collect()?;
        let exported = self.export(collection).await;
        if let Some(exporter) = &self.inner.exporter {
            exporter.shutdown().await?;
        }
        tracing::debug!("manual reader stopped");
        exported
    }
}

#[derive(Default)]
pub struct ManualReaderBuilder {
    selector: Option<Arc<dyn TemporalitySelector>>,
    exporter: Option<Arc<dyn Exporter>>,
}

impl ManualReaderBuilder {
    pub fn with_temporality(self, selector: impl TemporalitySelector) -> Self {
        self.with_selector(Arc::new(selector))
    }

    /// Same as `with_temporality` for a selector chosen at runtime.
    pub fn with_selector(mut self, selector: Arc<dyn TemporalitySelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Exporter fed by `force_flush` and the final pass on shutdown.
    pub fn with_exporter(mut self, exporter: impl Exporter) -> Self {
        self.exporter = Some(Arc::new(exporter));
        self
    }

    pub fn build(self) -> ManualReader {
        ManualReader {
            inner: Arc::new(Inner {
                selector: self.selector.unwrap_or_else(|| Arc::new(CumulativeOnly)),
                pipeline: OnceLock::new(),
                state: Mutex::new(ReaderState::Idle),
                pass: Mutex::new(()),
                exporter: self.exporter,
            }),
        }
    }
}
