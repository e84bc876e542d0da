//! Periodic reader: collects on a fixed interval and pushes each snapshot
//! to its exporter. Shutdown stops the ticker, waits for an in-flight pass,
//! then runs and exports the final pass.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use meterkit_core::error::{MeterError, Result};
use meterkit_core::{
    Collection, Exporter, ManualReader, MetricReader, Pipeline, TemporalitySelector,
};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

struct Inner {
    reader: ManualReader,
    exporter: Arc<dyn Exporter>,
    stop: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<Result<()>>>>,
}

#[derive(Clone)]
pub struct PeriodicReader {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PeriodicReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicReader")
            .field("reader", &self.inner.reader)
            .field("exporter", &self.inner.exporter)
            .finish_non_exhaustive()
    }
}

impl PeriodicReader {
    pub fn builder(exporter: impl Exporter) -> PeriodicReaderBuilder {
        PeriodicReaderBuilder {
            exporter: Arc::new(exporter),
            interval: DEFAULT_INTERVAL,
            selector: None,
        }
    }
}

pub struct PeriodicReaderBuilder {
    exporter: Arc<dyn Exporter>,
    interval: Duration,
    selector: Option<Arc<dyn TemporalitySelector>>,
}

impl PeriodicReaderBuilder {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval.is_zero() {
            tracing::warn!("zero periodic interval ignored");
        } else {
            self.interval = interval;
        }
        self
    }

    pub fn with_selector(mut self, selector: Arc<dyn TemporalitySelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Spawns the collection task; must be called inside a tokio runtime.
    pub fn build(self) -> PeriodicReader {
        let mut builder = ManualReader::builder();
        if let Some(selector) = self.selector {
            builder = builder.with_selector(selector);
        }
        let reader = builder.build();
        let (stop, stop_rx) = watch::channel(false);

        let task = tokio::spawn(run(
            reader.clone(),
            Arc::clone(&self.exporter),
            self.interval,
            stop_rx,
        ));

        PeriodicReader {
            inner: Arc::new(Inner {
                reader,
                exporter: self.exporter,
                stop,
                task: Mutex::new(Some(task)),
            }),
        }
    }
}

async fn run(
    reader: ManualReader,
    exporter: Arc<dyn Exporter>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) -> Result<()> {
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    // a slow export skips ticks instead of queuing overlapping passes
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            scheduled = ticker.tick() => {
                let late = scheduled.elapsed();
                if late >= interval {
                    tracing::debug!(?late, "previous pass overran the interval, ticks skipped");
                }
                if let Err(err) = export_once(&reader, exporter.as_ref()).await {
                    tracing::warn!(error = %err, "periodic export failed");
                }
            }
            _ = stop.changed() => break,
        }
    }

    let collection = reader.shutdown_collect()?;
    let exported = export(collection, exporter.as_ref()).await;
    exporter.shutdown().await?;
    tracing::info!("periodic reader stopped");
    exported
}

async fn export_once(reader: &ManualReader, exporter: &dyn Exporter) -> Result<()> {
    let collection = match reader.collect() {
        Ok(c) => c,
        Err(MeterError::ReaderNotRegistered) => {
            tracing::debug!("periodic reader not registered yet, skipping tick");
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    export(collection, exporter).await
}

/// Export the snapshot, then surface the first observer fault of the pass.
async fn export(collection: Collection, exporter: &dyn Exporter) -> Result<()> {
    let (metrics, partial) = collection.into_parts();
    exporter.export(metrics).await?;
    partial.map_or(Ok(()), Err)
}

#[async_trait]
impl MetricReader for PeriodicReader {
    fn register_pipeline(&self, pipeline: Arc<Pipeline>) -> Result<()> {
        self.inner.reader.register_pipeline(pipeline)
    }

    fn temporality_selector(&self) -> Arc<dyn TemporalitySelector> {
        self.inner.reader.temporality_selector()
    }

    async fn force_flush(&self) -> Result<()> {
        let exported = export_once(&self.inner.reader, self.inner.exporter.as_ref()).await;
        exported.and(self.inner.exporter.force_flush().await)
    }

    async fn shutdown(&self) -> Result<()> {
        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(MeterError::Closed)?;
        // the task may already have exited; its result is reported below
        let _ = self.inner.stop.send(true);
        task.await
            .map_err(|e| MeterError::Internal(format!("periodic task failed: {e}")))?
    }
}
