//! Snapshot model: the immutable output of one collection pass.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::attributes::AttributeSet;
use crate::instrument::NumberValue;
use crate::resource::{Resource, Scope};
use crate::temporality::Temporality;

/// Everything one reader collected in one pass.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceMetrics {
    pub resource: Resource,
    pub scope_metrics: Vec<ScopeMetrics>,
}

impl ResourceMetrics {
    /// Find a stream by reported name across all scopes.
    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.scope_metrics
            .iter()
            .flat_map(|sm| sm.metrics.iter())
            .find(|m| m.name == name)
    }

    /// Zero every timestamp (for reproducible output).
    pub fn strip_timestamps(&mut self) {
        for metric in self.scope_metrics.iter_mut().flat_map(|sm| sm.metrics.iter_mut()) {
            match &mut metric.data {
                MetricData::Sum { points, .. } | MetricData::Gauge { points } => {
                    for p in points {
                        p.start_time_unix_nano = 0;
                        p.time_unix_nano = 0;
                    }
                }
                MetricData::Histogram { points, .. } => {
                    for p in points {
                        p.start_time_unix_nano = 0;
                        p.time_unix_nano = 0;
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeMetrics {
    pub scope: Scope,
    pub metrics: Vec<Metric>,
}

/// One output stream.
#[derive(Debug, Clone, Serialize)]
pub struct Metric {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub data: MetricData,
}

#[derive(Debug, Clone, Serialize)]
pub enum MetricData {
    Sum {
        points: Vec<DataPoint>,
        temporality: Temporality,
        monotonic: bool,
    },
    Gauge {
        points: Vec<DataPoint>,
    },
    Histogram {
        points: Vec<HistogramDataPoint>,
        temporality: Temporality,
    },
}

impl MetricData {
    pub fn temporality(&self) -> Option<Temporality> {
        match self {
            MetricData::Sum { temporality, .. } | MetricData::Histogram { temporality, .. } => {
                Some(*temporality)
            }
            MetricData::Gauge { .. } => None,
        }
    }

    /// Sum or gauge points; empty for histograms.
    pub fn points(&self) -> &[DataPoint] {
        match self {
            MetricData::Sum { points, .. } | MetricData::Gauge { points } => points,
            MetricData::Histogram { .. } => &[],
        }
    }

    pub fn histogram_points(&self) -> &[HistogramDataPoint] {
        match self {
            MetricData::Histogram { points, .. } => points,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DataPoint {
    pub attributes: AttributeSet,
    pub start_time_unix_nano: u64,
    pub time_unix_nano: u64,
    pub value: NumberValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramDataPoint {
    pub attributes: AttributeSet,
    pub start_time_unix_nano: u64,
    pub time_unix_nano: u64,
    pub count: u64,
    pub sum: NumberValue,
    /// Upper-inclusive bucket boundaries.
    pub bounds: Vec<f64>,
    /// `bounds.len() + 1` counts; the last one is the overflow bucket.
    pub bucket_counts: Vec<u64>,
    pub min: Option<NumberValue>,
    pub max: Option<NumberValue>,
}

pub(crate) fn unix_nanos(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
