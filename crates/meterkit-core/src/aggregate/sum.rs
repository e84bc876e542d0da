use crate::attributes::AttributeSet;
use crate::data::{DataPoint, MetricData};
use crate::error::MeterError;
use crate::instrument::Number;
use crate::temporality::Temporality;

use super::{Collect, Measure, ValueMap};

#[derive(Default)]
struct SumCell<T> {
    value: T,
    /// Measured since the last delta read.
    touched: bool,
    /// Overflow already reported for this cell.
    saturated: bool,
}

/// Sum aggregator for counters and up/down counters.
pub(crate) struct Sum<T: Number> {
    stream: String,
    monotonic: bool,
    temporality: Temporality,
    values: ValueMap<SumCell<T>>,
}

impl<T: Number> Sum<T> {
    pub(crate) fn new(
        stream: String,
        monotonic: bool,
        temporality: Temporality,
        allowed_keys: Option<Vec<String>>,
        limit: usize,
    ) -> Self {
        Self {
            stream,
            monotonic,
            temporality,
            values: ValueMap::new(allowed_keys, limit, SumCell::default),
        }
    }
}

impl<T: Number> Measure<T> for Sum<T> {
    fn measure(&self, value: T, attrs: &AttributeSet) {
        self.values.update(attrs, |cell| {
            let (next, saturated) = cell.value.saturating_add_flag(value);
            cell.value = next;
            cell.touched = true;
            if saturated && !cell.saturated {
                cell.saturated = true;
                tracing::warn!(
                    error = %MeterError::Overflow(self.stream.clone()),
                    "sum saturated"
                );
            }
        });
    }
}

impl<T: Number> Collect for Sum<T> {
    fn collect(&self, start: u64, now: u64) -> Option<MetricData> {
        let mut points = Vec::new();
        match self.temporality {
            Temporality::Delta => self.values.drain(|attrs, cell| {
                if cell.touched {
                    points.push(point(attrs, start, now, cell.value));
                }
            }),
            Temporality::Cumulative => self
                .values
                .for_each(|attrs, cell| points.push(point(attrs, start, now, cell.value))),
        }

        if points.is_empty() {
            return None;
        }
        Some(MetricData::Sum {
            points,
            temporality: self.temporality,
            monotonic: self.monotonic,
        })
    }
}

fn point<T: Number>(attrs: &AttributeSet, start: u64, now: u64, value: T) -> DataPoint {
    DataPoint {
        attributes: attrs.clone(),
        start_time_unix_nano: start,
        time_unix_nano: now,
        value: value.into_value(),
    }
}
