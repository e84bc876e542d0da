use std::collections::HashMap;

use crate::attributes::AttributeSet;
use crate::data::DataPoint;
use crate::instrument::NumberValue;
use crate::view::Stream;

use super::overflow_set;

/// Turn one pass worth of observations into data points.
///
/// Observed values are absolute and pass through untouched: the last
/// observation of an attribute set wins. Sets past the cardinality limit are
/// folded into the overflow set (summed for sums, last value for gauges).
pub(crate) fn fold_observations(
    stream: &Stream,
    observations: &[(AttributeSet, NumberValue)],
    sum_overflow: bool,
    start: u64,
    now: u64,
) -> Vec<DataPoint> {
    let mut order: Vec<AttributeSet> = Vec::new();
    let mut values: HashMap<AttributeSet, NumberValue> = HashMap::new();
    let mut overflow: Option<NumberValue> = None;

    for (attrs, value) in observations {
        let attrs = match &stream.allowed_keys {
            Some(keys) => attrs.filter_keys(keys),
            None => attrs.clone(),
        };
        if let Some(slot) = values.get_mut(&attrs) {
            *slot = *value;
            continue;
        }
        if values.len() >= stream.cardinality_limit.saturating_sub(1) {
            overflow = Some(match (overflow, sum_overflow) {
                (Some(prev), true) => add(prev, *value),
                _ => *value,
            });
            continue;
        }
        order.push(attrs.clone());
        values.insert(attrs, *value);
    }

    let mut points: Vec<DataPoint> = order
        .into_iter()
        .filter_map(|attrs| {
            let value = values.remove(&attrs)?;
            Some(DataPoint {
                attributes: attrs,
                start_time_unix_nano: start,
                time_unix_nano: now,
                value,
            })
        })
        .collect();

    if let Some(value) = overflow {
        points.push(DataPoint {
            attributes: overflow_set(),
            start_time_unix_nano: start,
            time_unix_nano: now,
            value,
        });
    }
    points
}

fn add(a: NumberValue, b: NumberValue) -> NumberValue {
    match (a, b) {
        (NumberValue::I64(x), NumberValue::I64(y)) => NumberValue::I64(x.saturating_add(y)),
        (x, y) => NumberValue::F64(x.as_f64() + y.as_f64()),
    }
}
