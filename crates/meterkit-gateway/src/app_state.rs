//! Shared application state: the composition root.
//!
//! Builds the resource, readers and meter provider from config, creates the
//! demo instruments and registers the runtime observer.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use meterkit_core::error::{MeterError, Result};
use meterkit_core::{
    Collection, ManualReader, MeterProvider, MeterProviderBuilder, Registration, Scope,
    TemporalitySelector,
};

use crate::config::{self, MeterkitConfig, PeriodicExporter, ResourceEnv};
use crate::export::{prometheus, PushExporter, StdoutExporter, TcpTransport};
use crate::reader::PeriodicReader;
use crate::services::{GcObserver, RequestWork};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: MeterkitConfig,
    provider: MeterProvider,
    console: ManualReader,
    console_exporter: StdoutExporter,
    pull: Option<ManualReader>,
    work: RequestWork,
    gc: Registration,
    draining: AtomicBool,
}

impl AppState {
    /// Build state writing console snapshots to stdout and reading resource
    /// overrides from the process environment.
    pub fn new(cfg: MeterkitConfig) -> Result<Self> {
        Self::with_console(cfg, ResourceEnv::from_process(), io::stdout())
    }

    /// Must run inside a tokio runtime when `periodic.enabled` is set.
    pub fn with_console(
        cfg: MeterkitConfig,
        env: ResourceEnv,
        console: impl Write + Send + 'static,
    ) -> Result<Self> {
        let resource = config::build_resource(&cfg.resource, &env)?;
        let selector = cfg.temporality.selector();

        let console_exporter = StdoutExporter::new(console).without_timestamps();
        let console = ManualReader::builder()
            .with_selector(Arc::clone(&selector))
            .with_exporter(console_exporter.clone())
            .build();

        let mut builder = MeterProvider::builder()
            .with_resource(resource)
            .with_reader(console.clone());
        for view in cfg.compiled_views()? {
            builder = builder.with_view(view);
        }

        // scrapes expect totals regardless of the configured temporality
        let pull = cfg.pull.enabled.then(ManualReader::new);
        if let Some(pull) = &pull {
            builder = builder.with_reader(pull.clone());
        }
        builder = with_periodic(builder, &cfg, selector);

        let provider = builder.build()?;
        let meter = provider.meter(
            Scope::new(cfg.service.scope_name.clone()).with_version(cfg.service.scope_version.clone()),
        );

        let duration = meter
            .histogram::<i64>("request.duration")
            .with_description("Time taken to perform a user request")
            .with_unit("ms")
            .build()?;
        let count = meter
            .counter::<i64>("request.count")
            .with_description("How many requests we get")
            .build()?;
        let gc_count = meter.observable_counter::<i64>("runtime.gc.count").build()?;
        let gc = meter.register_callback(GcObserver::new(gc_count.clone()), &[&gc_count])?;

        tracing::info!(
            resource = ?provider.resource(),
            pull = cfg.pull.enabled,
            periodic = cfg.periodic.enabled,
            views = cfg.views.len(),
            "meter provider ready"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                provider,
                console,
                console_exporter,
                pull,
                work: RequestWork::new(count, duration),
                gc,
                draining: AtomicBool::new(false),
            }),
        })
    }

    pub fn cfg(&self) -> &MeterkitConfig {
        &self.inner.cfg
    }

    pub fn provider(&self) -> &MeterProvider {
        &self.inner.provider
    }

    pub fn work(&self) -> &RequestWork {
        &self.inner.work
    }

    pub fn set_draining(&self) {
        self.inner.draining.store(true, Ordering::Relaxed);
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.load(Ordering::Relaxed)
    }

    /// Manual collection: print the snapshot to the console and return it.
    pub async fn collect_console(&self) -> Result<Collection> {
        let reader = self.inner.console.clone();
        let collection = tokio::task::spawn_blocking(move || reader.collect())
            .await
            .map_err(|e| MeterError::Internal(format!("collect task failed: {e}")))??;
        self.inner
            .console_exporter
            .write(collection.metrics.clone())?;
        Ok(collection)
    }

    /// Pull scrape rendered as Prometheus text. `None` when pull is disabled.
    pub async fn scrape(&self) -> Result<Option<String>> {
        let Some(reader) = self.inner.pull.clone() else {
            return Ok(None);
        };
        let collection = tokio::task::spawn_blocking(move || reader.collect())
            .await
            .map_err(|e| MeterError::Internal(format!("scrape task failed: {e}")))??;
        let (metrics, partial) = collection.into_parts();
        if let Some(err) = partial {
            tracing::warn!(error = %err, "scrape completed with observer errors");
        }
        Ok(Some(prometheus::render(&metrics)))
    }

    /// Drain and shut the provider down; every reader runs its final pass.
    pub async fn shutdown(&self) -> Result<()> {
        self.set_draining();
        let result = self.inner.provider.shutdown().await;
        // after the final pass so it still observes once more
        self.inner.gc.unregister()?;
        result
    }
}

fn with_periodic(
    builder: MeterProviderBuilder,
    cfg: &MeterkitConfig,
    selector: Arc<dyn TemporalitySelector>,
) -> MeterProviderBuilder {
    if !cfg.periodic.enabled {
        return builder;
    }
    let reader = match cfg.periodic.exporter {
        PeriodicExporter::Stdout => PeriodicReader::builder(StdoutExporter::new(io::stdout())),
        PeriodicExporter::Push => PeriodicReader::builder(PushExporter::new(
            TcpTransport::new(cfg.push.endpoint.clone()),
            cfg.push.backoff(),
        )),
    }
    .with_interval(cfg.periodic.interval())
    .with_selector(selector)
    .build();
    tracing::info!(
        interval_ms = cfg.periodic.interval_ms,
        exporter = ?cfg.periodic.exporter,
        "periodic export enabled"
    );
    builder.with_reader(reader)
}
