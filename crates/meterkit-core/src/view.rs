//! View engine: selectors that rewrite an instrument's output stream.
//!
//! Views are evaluated in registration order, first match wins. The resolved
//! stream is cached per instrument identity the first time the instrument is
//! created, so the aggregation an instrument is recorded with can never change
//! after its first measurement.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{MeterError, Result};
use crate::instrument::{
    validate_boundaries, validate_name, InstrumentDescriptor, InstrumentId, InstrumentKind,
    DEFAULT_BOUNDARIES,
};

/// Default cap on distinct attribute sets per stream.
pub const DEFAULT_CARDINALITY_LIMIT: usize = 2000;

/// Instrument-name matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Exact(String),
    Prefix(String),
}

impl Pattern {
    pub fn exact(name: impl Into<String>) -> Self {
        Pattern::Exact(name.into())
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        Pattern::Prefix(prefix.into())
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Pattern::Exact(n) => n == name,
            Pattern::Prefix(p) => name.starts_with(p.as_str()),
        }
    }
}

/// Aggregation override carried by a view.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Use the instrument kind's default.
    Default,
    /// Compute, then discard at collection.
    Drop,
    Sum,
    LastValue,
    ExplicitBucketHistogram {
        boundaries: Vec<f64>,
        record_min_max: bool,
    },
}

#[derive(Debug, Clone)]
struct Selector {
    pattern: Pattern,
    scope: Option<(String, Option<String>)>,
    kind: Option<InstrumentKind>,
}

impl Selector {
    fn matches(&self, desc: &InstrumentDescriptor) -> bool {
        if !self.pattern.matches(&desc.name) {
            return false;
        }
        if let Some(kind) = self.kind {
            if kind != desc.kind {
                return false;
            }
        }
        match &self.scope {
            None => true,
            Some((name, version)) => *name == desc.scope.name && *version == desc.scope.version,
        }
    }
}

/// A compiled view. Build with [`View::builder`].
#[derive(Debug, Clone)]
pub struct View {
    selector: Selector,
    name: Option<String>,
    description: Option<String>,
    aggregation: Aggregation,
    allowed_keys: Option<Vec<String>>,
    cardinality_limit: Option<usize>,
}

impl View {
    pub fn builder(pattern: Pattern) -> ViewBuilder {
        ViewBuilder {
            view: View {
                selector: Selector {
                    pattern,
                    scope: None,
                    kind: None,
                },
                name: None,
                description: None,
                aggregation: Aggregation::Default,
                allowed_keys: None,
                cardinality_limit: None,
            },
        }
    }
}

pub struct ViewBuilder {
    view: View,
}

impl ViewBuilder {
    /// Match only instruments from this exact scope name and version.
    pub fn scope(mut self, name: impl Into<String>, version: Option<&str>) -> Self {
        self.view.selector.scope = Some((name.into(), version.map(str::to_string)));
        self
    }

    pub fn kind(mut self, kind: InstrumentKind) -> Self {
        self.view.selector.kind = Some(kind);
        self
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.view.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.view.description = Some(description.into());
        self
    }

    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.view.aggregation = aggregation;
        self
    }

    pub fn drop(self) -> Self {
        self.aggregation(Aggregation::Drop)
    }

    pub fn allowed_attribute_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.view.allowed_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn cardinality_limit(mut self, limit: usize) -> Self {
        self.view.cardinality_limit = Some(limit);
        self
    }

    pub fn build(self) -> Result<View> {
        let view = self.view;
        if let Some(name) = &view.name {
            if matches!(view.selector.pattern, Pattern::Prefix(_)) {
                return Err(MeterError::InvalidView(format!(
                    "rename to {name:?} would merge every instrument matching a prefix"
                )));
            }
            validate_name(name).map_err(|_| {
                MeterError::InvalidView(format!("invalid stream name: {name:?}"))
            })?;
        }
        if let Aggregation::ExplicitBucketHistogram { boundaries, .. } = &view.aggregation {
            validate_boundaries(boundaries)?;
        }
        if view.cardinality_limit == Some(0) {
            return Err(MeterError::InvalidView(
                "cardinality limit must be positive".into(),
            ));
        }
        Ok(view)
    }
}

/// Aggregation after defaults and compatibility have been applied.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamAggregation {
    Drop,
    Sum { monotonic: bool },
    LastValue,
    Histogram {
        bounds: Arc<[f64]>,
        record_min_max: bool,
    },
}

/// Output stream an instrument resolves to.
#[derive(Debug, Clone)]
pub struct Stream {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub aggregation: StreamAggregation,
    pub allowed_keys: Option<Vec<String>>,
    pub cardinality_limit: usize,
}

impl Stream {
    pub fn is_dropped(&self) -> bool {
        self.aggregation == StreamAggregation::Drop
    }
}

fn default_aggregation(desc: &InstrumentDescriptor) -> StreamAggregation {
    match desc.kind {
        InstrumentKind::Counter
        | InstrumentKind::UpDownCounter
        | InstrumentKind::ObservableCounter
        | InstrumentKind::ObservableUpDownCounter => StreamAggregation::Sum {
            monotonic: desc.kind.is_monotonic(),
        },
        InstrumentKind::Histogram => StreamAggregation::Histogram {
            bounds: desc
                .boundaries
                .as_deref()
                .unwrap_or(&DEFAULT_BOUNDARIES)
                .into(),
            record_min_max: true,
        },
        InstrumentKind::ObservableGauge => StreamAggregation::LastValue,
    }
}

fn override_aggregation(desc: &InstrumentDescriptor, agg: &Aggregation) -> Option<StreamAggregation> {
    match agg {
        Aggregation::Default => Some(default_aggregation(desc)),
        Aggregation::Drop => Some(StreamAggregation::Drop),
        Aggregation::Sum => (desc.kind != InstrumentKind::ObservableGauge).then(|| {
            StreamAggregation::Sum {
                monotonic: desc.kind.is_monotonic(),
            }
        }),
        Aggregation::LastValue => {
            (desc.kind == InstrumentKind::ObservableGauge).then_some(StreamAggregation::LastValue)
        }
        Aggregation::ExplicitBucketHistogram {
            boundaries,
            record_min_max,
        } => desc.kind.is_synchronous().then(|| StreamAggregation::Histogram {
            bounds: boundaries.as_slice().into(),
            record_min_max: *record_min_max,
        }),
    }
}

/// Ordered view list plus the per-instrument resolution cache.
#[derive(Debug, Default)]
pub struct ViewEngine {
    views: Vec<View>,
    cache: DashMap<InstrumentId, Arc<Stream>>,
}

impl ViewEngine {
    pub fn new(views: Vec<View>) -> Self {
        Self {
            views,
            cache: DashMap::new(),
        }
    }

    /// Resolve (once) the stream for an instrument.
    pub fn resolve(&self, desc: &InstrumentDescriptor) -> Arc<Stream> {
        let id = desc.id();
        if let Some(hit) = self.cache.get(&id) {
            return Arc::clone(hit.value());
        }
        let stream = Arc::new(self.compute(desc));
        Arc::clone(self.cache.entry(id).or_insert(stream).value())
    }

    fn compute(&self, desc: &InstrumentDescriptor) -> Stream {
        let mut stream = Stream {
            name: desc.name.clone(),
            description: desc.description.clone(),
            unit: desc.unit.clone(),
            aggregation: default_aggregation(desc),
            allowed_keys: None,
            cardinality_limit: DEFAULT_CARDINALITY_LIMIT,
        };

        let Some(view) = self.views.iter().find(|v| v.selector.matches(desc)) else {
            return stream;
        };

        if let Some(name) = &view.name {
            stream.name = name.clone();
        }
        if let Some(description) = &view.description {
            stream.description = description.clone();
        }
        match override_aggregation(desc, &view.aggregation) {
            Some(agg) => stream.aggregation = agg,
            None => tracing::warn!(
                instrument = %desc.id(),
                kind = %desc.kind,
                aggregation = ?view.aggregation,
                "view aggregation incompatible with instrument kind, using default"
            ),
        }
        stream.allowed_keys = view.allowed_keys.clone();
        if let Some(limit) = view.cardinality_limit {
            stream.cardinality_limit = limit;
        }
        stream
    }
}
