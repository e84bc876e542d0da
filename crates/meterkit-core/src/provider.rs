//! Meter provider: composition root of the SDK.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::callback::CallbackRegistry;
use crate::error::{MeterError, Result};
use crate::meter::Meter;
use crate::pipeline::Pipeline;
use crate::reader::MetricReader;
use crate::registry::InstrumentRegistry;
use crate::resource::{Resource, Scope};
use crate::view::{View, ViewEngine};

static NEXT_PROVIDER_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct ProviderInner {
    pub(crate) id: u64,
    pub(crate) resource: Resource,
    pub(crate) views: ViewEngine,
    pub(crate) registry: InstrumentRegistry,
    pub(crate) pipelines: Vec<Arc<Pipeline>>,
    pub(crate) callbacks: Arc<CallbackRegistry>,
    readers: Vec<Arc<dyn MetricReader>>,
    shutdown: AtomicBool,
}

/// Owns the resource, the views and every attached reader.
///
/// Cheap to clone; all clones share the same instruments and readers.
#[derive(Clone)]
pub struct MeterProvider {
    inner: Arc<ProviderInner>,
}

impl std::fmt::Debug for MeterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeterProvider")
            .field("id", &self.inner.id)
            .field("resource", &self.inner.resource)
            .field("readers", &self.inner.readers.len())
            .finish()
    }
}

impl MeterProvider {
    pub fn builder() -> MeterProviderBuilder {
        MeterProviderBuilder::default()
    }

    pub fn resource(&self) -> &Resource {
        &self.inner.resource
    }

    /// Number of distinct instruments created so far.
    pub fn instrument_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Meter for the given scope. Meters for equal scopes share instruments.
    pub fn meter(&self, scope: impl Into<Scope>) -> Meter {
        Meter::new(scope.into(), Arc::clone(&self.inner))
    }

    /// Flush every reader. All readers are attempted; the first error wins.
    pub async fn force_flush(&self) -> Result<()> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(MeterError::Closed);
        }
        let mut first_err = None;
        for reader in &self.inner.readers {
            if let Err(e) = reader.force_flush().await {
                tracing::warn!(error = %e, "reader flush failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Shut down every reader. A second call returns `Closed`.
    pub async fn shutdown(&self) -> Result<()> {
        if self.inner.shutdown.swap(true, Ordering::AcqRel) {
            return Err(MeterError::Closed);
        }
        let mut first_err = None;
        for reader in &self.inner.readers {
            if let Err(e) = reader.shutdown().await {
                tracing::warn!(error = %e, "reader shutdown failed");
                first_err.get_or_insert(e);
            }
        }
        tracing::info!(provider = self.inner.id, "meter provider shut down");
        first_err.map_or(Ok(()), Err)
    }
}

#[derive(Default)]
pub struct MeterProviderBuilder {
    resource: Option<Resource>,
    readers: Vec<Arc<dyn MetricReader>>,
    views: Vec<View>,
}

impl MeterProviderBuilder {
    /// Resource attached to every export. Defaults to `Resource::default()`.
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn with_reader(mut self, reader: impl MetricReader) -> Self {
        self.readers.push(Arc::new(reader));
        self
    }

    /// Views are matched in the order they were added; the first match wins.
    pub fn with_view(mut self, view: View) -> Self {
        self.views.push(view);
        self
    }

    pub fn build(self) -> Result<MeterProvider> {
        let id = NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed);
        let resource = self.resource.unwrap_or_default();
        let callbacks = Arc::new(CallbackRegistry::new(id));
        let start = SystemTime::now();

        let mut pipelines = Vec::with_capacity(self.readers.len());
        for reader in &self.readers {
            let pipeline = Arc::new(Pipeline::new(
                resource.clone(),
                start,
                reader.temporality_selector(),
                Arc::clone(&callbacks),
            ));
            reader.register_pipeline(Arc::clone(&pipeline))?;
            pipelines.push(pipeline);
        }

        tracing::debug!(
            provider = id,
            readers = pipelines.len(),
            views = self.views.len(),
            "meter provider built"
        );

        Ok(MeterProvider {
            inner: Arc::new(ProviderInner {
                id,
                resource,
                views: ViewEngine::new(self.views),
                registry: InstrumentRegistry::default(),
                pipelines,
                callbacks,
                readers: self.readers,
                shutdown: AtomicBool::new(false),
            }),
        })
    }
}
