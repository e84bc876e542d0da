use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use meterkit_core::error::{MeterError, Result};
use meterkit_core::{
    Aggregation, BackoffPolicy, CumulativeOnly, DeltaPreferred, InstrumentKind, KeyValue, Pattern,
    Resource, TemporalitySelector, Value, View,
};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeterkitConfig {
    pub version: u32,

    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub resource: ResourceSection,

    #[serde(default)]
    pub temporality: TemporalityConfig,

    #[serde(default)]
    pub console: ConsoleSection,

    #[serde(default)]
    pub periodic: PeriodicSection,

    #[serde(default)]
    pub push: PushSection,

    #[serde(default)]
    pub pull: PullSection,

    #[serde(default)]
    pub views: Vec<ViewConfig>,
}

impl MeterkitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MeterError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.service.validate()?;
        self.periodic.validate()?;
        self.push.validate()?;
        // compile once so bad views fail at load, not at provider build
        self.compiled_views()?;
        Ok(())
    }

    pub fn compiled_views(&self) -> Result<Vec<View>> {
        self.views
            .iter()
            .enumerate()
            .map(|(i, v)| {
                v.to_view()
                    .map_err(|e| MeterError::Config(format!("views[{i}]: {e}")))
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_scope_name")]
    pub scope_name: String,

    #[serde(default = "default_scope_version")]
    pub scope_version: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            scope_name: default_scope_name(),
            scope_version: default_scope_version(),
        }
    }
}

impl ServiceSection {
    pub fn validate(&self) -> Result<()> {
        if self.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(MeterError::Config(
                "service.listen must be a valid socket address".into(),
            ));
        }
        if self.scope_name.trim().is_empty() {
            return Err(MeterError::Config("service.scope_name must not be empty".into()));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "127.0.0.1:8080".into()
}
fn default_scope_name() -> String {
    "io.example.opentelemetry.runtime".into()
}
fn default_scope_version() -> String {
    "v1.1.1".into()
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceSection {
    #[serde(default)]
    pub schema_url: Option<String>,

    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl ResourceSection {
    pub fn to_resource(&self) -> Resource {
        let resource = Resource::new(
            self.attributes
                .iter()
                .map(|(k, v)| KeyValue::new(k.clone(), v.clone())),
        );
        match &self.schema_url {
            Some(url) => resource.with_schema_url(url.clone()),
            None => resource,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalityConfig {
    #[default]
    Cumulative,
    Delta,
}

impl TemporalityConfig {
    pub fn selector(self) -> Arc<dyn TemporalitySelector> {
        match self {
            TemporalityConfig::Cumulative => Arc::new(CumulativeOnly),
            TemporalityConfig::Delta => Arc::new(DeltaPreferred),
        }
    }
}

/// Stdin trigger: every line read runs one manual collection.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConsoleSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ConsoleSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeriodicSection {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default)]
    pub exporter: PeriodicExporter,
}

impl Default for PeriodicSection {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_interval_ms(),
            exporter: PeriodicExporter::default(),
        }
    }
}

impl PeriodicSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=3_600_000).contains(&self.interval_ms) {
            return Err(MeterError::Config(
                "periodic.interval_ms must be between 100 and 3600000".into(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_interval_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodicExporter {
    #[default]
    Stdout,
    Push,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushSection {
    #[serde(default = "default_push_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    #[serde(default = "default_max_elapsed_ms")]
    pub max_elapsed_ms: u64,
}

impl Default for PushSection {
    fn default() -> Self {
        Self {
            endpoint: default_push_endpoint(),
            initial_interval_ms: default_initial_interval_ms(),
            multiplier: default_multiplier(),
            max_interval_ms: default_max_interval_ms(),
            max_elapsed_ms: default_max_elapsed_ms(),
        }
    }
}

impl PushSection {
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(MeterError::Config("push.endpoint must not be empty".into()));
        }
        if self.initial_interval_ms == 0 {
            return Err(MeterError::Config(
                "push.initial_interval_ms must be positive".into(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(MeterError::Config("push.multiplier must be >= 1.0".into()));
        }
        if self.max_interval_ms < self.initial_interval_ms {
            return Err(MeterError::Config(
                "push.max_interval_ms must be >= initial_interval_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_interval: Duration::from_millis(self.initial_interval_ms),
            multiplier: self.multiplier,
            max_interval: Duration::from_millis(self.max_interval_ms),
            max_elapsed_time: Duration::from_millis(self.max_elapsed_ms),
        }
    }
}

fn default_push_endpoint() -> String {
    "127.0.0.1:4318".into()
}
fn default_initial_interval_ms() -> u64 {
    5_000
}
fn default_multiplier() -> f64 {
    1.5
}
fn default_max_interval_ms() -> u64 {
    30_000
}
fn default_max_elapsed_ms() -> u64 {
    60_000
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PullSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PullSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindConfig {
    Counter,
    UpDownCounter,
    Histogram,
    ObservableCounter,
    ObservableUpDownCounter,
    ObservableGauge,
}

impl From<KindConfig> for InstrumentKind {
    fn from(k: KindConfig) -> Self {
        match k {
            KindConfig::Counter => InstrumentKind::Counter,
            KindConfig::UpDownCounter => InstrumentKind::UpDownCounter,
            KindConfig::Histogram => InstrumentKind::Histogram,
            KindConfig::ObservableCounter => InstrumentKind::ObservableCounter,
            KindConfig::ObservableUpDownCounter => InstrumentKind::ObservableUpDownCounter,
            KindConfig::ObservableGauge => InstrumentKind::ObservableGauge,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationConfig {
    #[default]
    Default,
    Drop,
    Sum,
    LastValue,
    Histogram,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewConfig {
    /// Exact instrument name.
    #[serde(default)]
    pub instrument: Option<String>,

    /// Instrument name prefix.
    #[serde(default)]
    pub instrument_prefix: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,

    #[serde(default)]
    pub scope_version: Option<String>,

    #[serde(default)]
    pub kind: Option<KindConfig>,

    #[serde(default)]
    pub rename: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub boundaries: Option<Vec<f64>>,

    #[serde(default = "default_true")]
    pub record_min_max: bool,

    #[serde(default)]
    pub attribute_keys: Option<Vec<String>>,

    #[serde(default)]
    pub cardinality_limit: Option<usize>,
}

impl ViewConfig {
    pub fn to_view(&self) -> Result<View> {
        let pattern = match (&self.instrument, &self.instrument_prefix) {
            (Some(name), None) => Pattern::exact(name.clone()),
            (None, Some(prefix)) => Pattern::prefix(prefix.clone()),
            _ => {
                return Err(MeterError::InvalidView(
                    "exactly one of instrument / instrument_prefix is required".into(),
                ))
            }
        };
        if self.scope_version.is_some() && self.scope.is_none() {
            return Err(MeterError::InvalidView(
                "scope_version requires scope".into(),
            ));
        }
        if self.boundaries.is_some() && self.aggregation != AggregationConfig::Histogram {
            return Err(MeterError::InvalidView(
                "boundaries only apply to the histogram aggregation".into(),
            ));
        }

        let mut builder = View::builder(pattern);
        if let Some(scope) = &self.scope {
            builder = builder.scope(scope.clone(), self.scope_version.as_deref());
        }
        if let Some(kind) = self.kind {
            builder = builder.kind(kind.into());
        }
        if let Some(name) = &self.rename {
            builder = builder.rename(name.clone());
        }
        if let Some(description) = &self.description {
            builder = builder.description(description.clone());
        }
        builder = builder.aggregation(match self.aggregation {
            AggregationConfig::Default => Aggregation::Default,
            AggregationConfig::Drop => Aggregation::Drop,
            AggregationConfig::Sum => Aggregation::Sum,
            AggregationConfig::LastValue => Aggregation::LastValue,
            AggregationConfig::Histogram => Aggregation::ExplicitBucketHistogram {
                boundaries: self
                    .boundaries
                    .clone()
                    .unwrap_or_else(|| meterkit_core::instrument::DEFAULT_BOUNDARIES.to_vec()),
                record_min_max: self.record_min_max,
            },
        });
        if let Some(keys) = &self.attribute_keys {
            builder = builder.allowed_attribute_keys(keys.iter().cloned());
        }
        if let Some(limit) = self.cardinality_limit {
            builder = builder.cardinality_limit(limit);
        }
        builder.build()
    }
}
