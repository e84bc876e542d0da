//! Instrument registry: identity, conflicts and concurrent creation.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::thread;

use meterkit_core::{ErrorCode, ManualReader, MeterError, MeterProvider, NumberValue};

fn provider() -> (MeterProvider, ManualReader) {
    let reader = ManualReader::new();
    let provider = MeterProvider::builder()
        .with_reader(reader.clone())
        .build()
        .unwrap();
    (provider, reader)
}

#[test]
fn identical_definition_returns_shared_handle() {
    let (provider, reader) = provider();
    let meter = provider.meter("svc");

    let a = meter.counter::<i64>("request.count").with_unit("1").build().unwrap();
    let b = meter.counter::<i64>("request.count").with_unit("1").build().unwrap();
    a.add(2, &[]);
    b.add(3, &[]);

    assert_eq!(provider.instrument_count(), 1);
    let rm = reader.collect().unwrap().metrics;
    let points = rm.metric("request.count").unwrap().data.points();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].value, NumberValue::I64(5));
}

#[test]
fn incompatible_redefinition_is_rejected() {
    let (provider, _reader) = provider();
    let meter = provider.meter("svc");

    meter.counter::<i64>("jobs").build().unwrap();

    let err = meter.up_down_counter::<i64>("jobs").build().unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateDefinition);

    let err = meter.counter::<f64>("jobs").build().unwrap_err();
    assert!(matches!(err, MeterError::DuplicateDefinition { .. }));

    let err = meter.counter::<i64>("jobs").with_unit("ms").build().unwrap_err();
    assert_eq!(err.code().as_str(), "DUPLICATE_DEFINITION");
}

#[test]
fn same_name_in_other_scope_is_independent() {
    let (provider, reader) = provider();
    provider.meter("a").counter::<i64>("jobs").build().unwrap().add(1, &[]);
    provider.meter("b").up_down_counter::<i64>("jobs").build().unwrap().add(-1, &[]);

    let rm = reader.collect().unwrap().metrics;
    assert_eq!(rm.scope_metrics.len(), 2);
    assert_eq!(provider.instrument_count(), 2);
}

#[test]
fn invalid_names_are_rejected() {
    let (provider, _reader) = provider();
    let meter = provider.meter("svc");

    for name in ["", "1abc", "has space", "a*b"] {
        let err = meter.counter::<i64>(name).build().unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidName, "name {name:?}");
    }
    assert!(meter.histogram::<f64>("ok.name_1/x-y").build().is_ok());
}

#[test]
fn invalid_advisory_boundaries_are_rejected() {
    let (provider, _reader) = provider();
    let err = provider
        .meter("svc")
        .histogram::<f64>("latency")
        .with_boundaries(vec![5.0, 1.0])
        .build()
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidView);
}

#[test]
fn concurrent_creation_yields_one_instrument() {
    let (provider, reader) = provider();
    let provider = Arc::new(provider);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let provider = Arc::clone(&provider);
            thread::spawn(move || {
                let counter = provider.meter("svc").counter::<i64>("hits").build().unwrap();
                for _ in 0..100 {
                    counter.add(1, &[]);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(provider.instrument_count(), 1);
    let rm = reader.collect().unwrap().metrics;
    assert_eq!(rm.metric("hits").unwrap().data.points()[0].value, NumberValue::I64(800));
}

#[test]
fn negative_counter_increment_is_dropped() {
    let (provider, reader) = provider();
    let counter = provider.meter("svc").counter::<f64>("bytes").build().unwrap();
    counter.add(1.5, &[]);
    counter.add(-4.0, &[]);
    counter.add(f64::NAN, &[]);

    let rm = reader.collect().unwrap().metrics;
    assert_eq!(rm.metric("bytes").unwrap().data.points()[0].value, NumberValue::F64(1.5));
}
