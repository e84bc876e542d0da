//! Per-reader collection pipeline.
//!
//! Every reader attached to a provider gets its own pipeline and therefore
//! its own aggregators: a delta reset performed by one reader never affects
//! what another reader sees.

use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

use crate::aggregate::{fold_observations, Collect, Histogram, Measure, Sum};
use crate::attributes::AttributeSet;
use crate::callback::CallbackRegistry;
use crate::data::{unix_nanos, Metric, MetricData, ResourceMetrics, ScopeMetrics};
use crate::error::MeterError;
use crate::instrument::{InstrumentDescriptor, InstrumentId, InstrumentKind, Number, NumberValue};
use crate::resource::{Resource, Scope};
use crate::sync::{lock, read, write};
use crate::temporality::{Temporality, TemporalitySelector};
use crate::view::{Stream, StreamAggregation};

/// Result of one collection pass: the snapshot plus any partial failures
/// (failed or misbehaving observers) that did not abort the pass.
#[derive(Debug)]
pub struct Collection {
    pub metrics: ResourceMetrics,
    pub errors: Vec<MeterError>,
}

impl Collection {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Split into the snapshot and the first partial failure, if any.
    pub fn into_parts(self) -> (ResourceMetrics, Option<MeterError>) {
        (self.metrics, self.errors.into_iter().next())
    }
}

enum Source {
    Sync(Arc<dyn Collect>),
    Observed(Arc<InstrumentId>),
}

struct PipelineStream {
    scope: Scope,
    kind: InstrumentKind,
    stream: Arc<Stream>,
    temporality: Temporality,
    source: Source,
}

/// Opaque pipeline handed to a reader on registration.
pub struct Pipeline {
    resource: Resource,
    start: SystemTime,
    selector: Arc<dyn TemporalitySelector>,
    callbacks: Arc<CallbackRegistry>,
    streams: RwLock<Vec<Arc<PipelineStream>>>,
    last_collect: Mutex<SystemTime>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub(crate) fn new(
        resource: Resource,
        start: SystemTime,
        selector: Arc<dyn TemporalitySelector>,
        callbacks: Arc<CallbackRegistry>,
    ) -> Self {
        Self {
            resource,
            start,
            selector,
            callbacks,
            streams: RwLock::new(Vec::new()),
            last_collect: Mutex::new(start),
        }
    }

    fn push(&self, stream: PipelineStream) {
        let mut streams = write(&self.streams);
        if let Some(existing) = streams
            .iter()
            .find(|s| s.scope == stream.scope && s.stream.name == stream.stream.name)
        {
            tracing::warn!(
                scope = %stream.scope.name,
                stream = %stream.stream.name,
                existing_kind = %existing.kind,
                kind = %stream.kind,
                "duplicate metric stream name in scope"
            );
        }
        streams.push(Arc::new(stream));
    }

    /// Create the aggregator for a synchronous instrument.
    pub(crate) fn add_sync<T: Number>(
        &self,
        desc: &InstrumentDescriptor,
        stream: Arc<Stream>,
    ) -> Arc<dyn Measure<T>> {
        let temporality = self.selector.temporality(desc.kind);
        let keys = stream.allowed_keys.clone();
        let limit = stream.cardinality_limit;
        let name = stream.name.clone();

        let (measure, collect): (Arc<dyn Measure<T>>, Arc<dyn Collect>) = match &stream.aggregation {
            StreamAggregation::Histogram {
                bounds,
                record_min_max,
            } => {
                let h = Arc::new(Histogram::<T>::new(
                    name,
                    Arc::clone(bounds),
                    *record_min_max,
                    temporality,
                    keys,
                    limit,
                ));
                split(h)
            }
            StreamAggregation::Sum { monotonic } => {
                split(Arc::new(Sum::<T>::new(name, *monotonic, temporality, keys, limit)))
            }
            // Dropped streams still aggregate (reset every pass, output discarded).
            // LastValue never resolves for synchronous kinds.
            StreamAggregation::Drop | StreamAggregation::LastValue => {
                split(Arc::new(Sum::<T>::new(name, false, Temporality::Delta, keys, limit)))
            }
        };

        self.push(PipelineStream {
            scope: desc.scope.clone(),
            kind: desc.kind,
            stream,
            temporality,
            source: Source::Sync(collect),
        });
        measure
    }

    /// Register an observable instrument; its values come from callbacks.
    pub(crate) fn add_observable(
        &self,
        desc: &InstrumentDescriptor,
        stream: Arc<Stream>,
        id: Arc<InstrumentId>,
    ) {
        self.push(PipelineStream {
            scope: desc.scope.clone(),
            kind: desc.kind,
            stream,
            temporality: self.selector.temporality(desc.kind),
            source: Source::Observed(id),
        });
    }

    /// Run one pass: observers, then every stream in registration order.
    pub(crate) fn produce(&self) -> Collection {
        let observed = self.callbacks.run();

        let now = SystemTime::now();
        let delta_start = std::mem::replace(&mut *lock(&self.last_collect), now);
        let now = unix_nanos(now);
        let delta_start = unix_nanos(delta_start);
        let cumulative_start = unix_nanos(self.start);

        let streams: Vec<Arc<PipelineStream>> = read(&self.streams).clone();

        let mut scope_metrics: Vec<ScopeMetrics> = Vec::new();
        for s in streams {
            let start = match s.temporality {
                Temporality::Delta => delta_start,
                Temporality::Cumulative => cumulative_start,
            };

            let data = match &s.source {
                Source::Sync(agg) => agg.collect(start, now),
                Source::Observed(id) => observed
                    .values
                    .get(id)
                    .and_then(|obs| observed_data(&s, obs, start, now)),
            };

            if s.stream.is_dropped() {
                continue;
            }
            let Some(data) = data else { continue };

            let metric = Metric {
                name: s.stream.name.clone(),
                description: s.stream.description.clone(),
                unit: s.stream.unit.clone(),
                data,
            };
            match scope_metrics.iter_mut().find(|sm| sm.scope == s.scope) {
                Some(sm) => sm.metrics.push(metric),
                None => scope_metrics.push(ScopeMetrics {
                    scope: s.scope.clone(),
                    metrics: vec![metric],
                }),
            }
        }

        Collection {
            metrics: ResourceMetrics {
                resource: self.resource.clone(),
                scope_metrics,
            },
            errors: observed.errors,
        }
    }
}

fn split<T, A>(agg: Arc<A>) -> (Arc<dyn Measure<T>>, Arc<dyn Collect>)
where
    T: Number,
    A: Measure<T> + Collect + 'static,
{
    let measure: Arc<dyn Measure<T>> = agg.clone();
    let collect: Arc<dyn Collect> = agg;
    (measure, collect)
}

fn observed_data(
    s: &PipelineStream,
    observations: &[(AttributeSet, NumberValue)],
    start: u64,
    now: u64,
) -> Option<MetricData> {
    let data = match &s.stream.aggregation {
        StreamAggregation::Sum { monotonic } => MetricData::Sum {
            points: fold_observations(&s.stream, observations, true, start, now),
            temporality: s.temporality,
            monotonic: *monotonic,
        },
        StreamAggregation::LastValue => MetricData::Gauge {
            points: fold_observations(&s.stream, observations, false, start, now),
        },
        // histograms are not offered for observable kinds
        StreamAggregation::Drop | StreamAggregation::Histogram { .. } => return None,
    };
    (!data_is_empty(&data)).then_some(data)
}

fn data_is_empty(data: &MetricData) -> bool {
    match data {
        MetricData::Sum { points, .. } | MetricData::Gauge { points } => points.is_empty(),
        MetricData::Histogram { points, .. } => points.is_empty(),
    }
}
