//! meterkit core: the metrics engine.
//!
//! Instruments record into per-reader aggregation pipelines; readers run
//! collection passes that execute observers, fold synchronous state through
//! views and temporality, and produce immutable [`ResourceMetrics`]
//! snapshots for an [`Exporter`].
//!
//! The crate has no async runtime dependency. Wire formats, HTTP surfaces and
//! timers live in `meterkit-gateway`.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Recording paths
//! never fail: invalid measurements are dropped with a `warn!` and aggregator
//! overflow saturates. Everything else surfaces as [`MeterError`].

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

mod aggregate;
pub mod attributes;
pub mod backoff;
pub mod callback;
pub mod data;
pub mod error;
pub mod export;
pub mod instrument;
pub mod meter;
mod pipeline;
pub mod provider;
pub mod reader;
mod registry;
pub mod resource;
mod sync;
pub mod temporality;
pub mod view;

pub use aggregate::OVERFLOW_KEY;
pub use attributes::{AttributeSet, KeyValue, Value};
pub use backoff::{Backoff, BackoffPolicy};
pub use callback::{AsObservable, Observable, Observations, Observer, Registration};
pub use data::{DataPoint, HistogramDataPoint, Metric, MetricData, ResourceMetrics, ScopeMetrics};
pub use error::{ErrorCode, MeterError, Result};
pub use export::{Exporter, InMemoryExporter};
pub use instrument::{InstrumentId, InstrumentKind, Number, NumberKind, NumberValue};
pub use meter::{
    Counter, Histogram, InstrumentBuilder, Meter, ObservableCounter, ObservableGauge,
    ObservableUpDownCounter, UpDownCounter,
};
pub use pipeline::{Collection, Pipeline};
pub use provider::{MeterProvider, MeterProviderBuilder};
pub use reader::{ManualReader, MetricReader, ReaderState};
pub use resource::{Resource, Scope};
pub use temporality::{CumulativeOnly, DeltaPreferred, Temporality, TemporalitySelector};
pub use view::{Aggregation, Pattern, View};
