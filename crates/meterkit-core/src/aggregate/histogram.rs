use std::sync::Arc;

use crate::attributes::AttributeSet;
use crate::data::{HistogramDataPoint, MetricData};
use crate::error::MeterError;
use crate::instrument::Number;
use crate::temporality::Temporality;

use super::{Collect, Measure, ValueMap};

struct Buckets<T> {
    counts: Vec<u64>,
    count: u64,
    sum: T,
    min: T,
    max: T,
    touched: bool,
    saturated: bool,
}

impl<T: Number> Buckets<T> {
    fn new(len: usize) -> Self {
        Self {
            counts: vec![0; len],
            count: 0,
            sum: T::default(),
            min: T::MAX,
            max: T::MIN,
            touched: false,
            saturated: false,
        }
    }
}

/// Explicit-bucket histogram aggregator.
pub(crate) struct Histogram<T: Number> {
    stream: String,
    bounds: Arc<[f64]>,
    record_min_max: bool,
    temporality: Temporality,
    values: ValueMap<Buckets<T>>,
}

impl<T: Number> Histogram<T> {
    pub(crate) fn new(
        stream: String,
        bounds: Arc<[f64]>,
        record_min_max: bool,
        temporality: Temporality,
        allowed_keys: Option<Vec<String>>,
        limit: usize,
    ) -> Self {
        let len = bounds.len() + 1;
        Self {
            stream,
            bounds,
            record_min_max,
            temporality,
            values: ValueMap::new(allowed_keys, limit, move || Buckets::new(len)),
        }
    }

    fn point(&self, attrs: &AttributeSet, start: u64, now: u64, b: &Buckets<T>) -> HistogramDataPoint {
        let has_values = b.count > 0;
        HistogramDataPoint {
            attributes: attrs.clone(),
            start_time_unix_nano: start,
            time_unix_nano: now,
            count: b.count,
            sum: b.sum.into_value(),
            bounds: self.bounds.to_vec(),
            bucket_counts: b.counts.clone(),
            min: (self.record_min_max && has_values).then(|| b.min.into_value()),
            max: (self.record_min_max && has_values).then(|| b.max.into_value()),
        }
    }

    /// Index of the upper-inclusive bucket `value` falls in.
    fn bucket(&self, value: f64) -> usize {
        self.bounds.partition_point(|b| *b < value)
    }
}

impl<T: Number> Measure<T> for Histogram<T> {
    fn measure(&self, value: T, attrs: &AttributeSet) {
        let idx = self.bucket(value.as_f64());
        self.values.update(attrs, |b| {
            if let Some(slot) = b.counts.get_mut(idx) {
                *slot = slot.saturating_add(1);
            }
            b.count = b.count.saturating_add(1);
            let (sum, saturated) = b.sum.saturating_add_flag(value);
            b.sum = sum;
            if value < b.min {
                b.min = value;
            }
            if value > b.max {
                b.max = value;
            }
            b.touched = true;
            if (saturated || b.count == u64::MAX) && !b.saturated {
                b.saturated = true;
                tracing::warn!(
                    error = %MeterError::Overflow(self.stream.clone()),
                    "histogram saturated"
                );
            }
        });
    }
}

impl<T: Number> Collect for Histogram<T> {
    fn collect(&self, start: u64, now: u64) -> Option<MetricData> {
        let mut points = Vec::new();
        match self.temporality {
            Temporality::Delta => self.values.drain(|attrs, b| {
                if b.touched {
                    points.push(self.point(attrs, start, now, &b));
                }
            }),
            Temporality::Cumulative => self
                .values
                .for_each(|attrs, b| points.push(self.point(attrs, start, now, b))),
        }

        if points.is_empty() {
            return None;
        }
        Some(MetricData::Histogram {
            points,
            temporality: self.temporality,
        })
    }
}
