//! Observable instruments and observer registration.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use meterkit_core::{
    DeltaPreferred, ErrorCode, KeyValue, ManualReader, MeterError, MeterProvider, MetricData,
    NumberValue, ObservableCounter, ObservableGauge, Observations, Observer, Result, Temporality,
};

struct GcObserver {
    collections: Arc<AtomicI64>,
    runs: Arc<AtomicUsize>,
    counter: ObservableCounter<i64>,
}

impl Observer for GcObserver {
    fn observe(&self, obs: &mut Observations<'_>) -> Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        obs.observe(
            &self.counter,
            self.collections.load(Ordering::SeqCst),
            &[KeyValue::new("generation", "young")],
        );
        Ok(())
    }
}

fn setup(reader: ManualReader) -> (MeterProvider, GcObserver) {
    let provider = MeterProvider::builder().with_reader(reader).build().unwrap();
    let counter = provider
        .meter("runtime")
        .observable_counter::<i64>("runtime.gc.count")
        .build()
        .unwrap();
    let observer = GcObserver {
        collections: Arc::new(AtomicI64::new(7)),
        runs: Arc::new(AtomicUsize::new(0)),
        counter,
    };
    (provider, observer)
}

#[test]
fn unchanged_state_reports_identical_values() {
    let reader = ManualReader::builder().with_temporality(DeltaPreferred).build();
    let (provider, observer) = setup(reader.clone());
    let counter = observer.counter.clone();
    provider
        .meter("runtime")
        .register_callback(observer, &[&counter])
        .unwrap();

    let first = reader.collect().unwrap().metrics;
    let second = reader.collect().unwrap().metrics;

    for rm in [&first, &second] {
        let data = &rm.metric("runtime.gc.count").unwrap().data;
        assert_eq!(data.temporality(), Some(Temporality::Delta));
        assert_eq!(data.points()[0].value, NumberValue::I64(7));
    }
}

#[test]
fn each_pass_invokes_observer_once() {
    let reader = ManualReader::new();
    let (provider, observer) = setup(reader.clone());
    let runs = Arc::clone(&observer.runs);
    let collections = Arc::clone(&observer.collections);
    let counter = observer.counter.clone();
    provider
        .meter("runtime")
        .register_callback(observer, &[&counter])
        .unwrap();

    reader.collect().unwrap();
    collections.store(9, Ordering::SeqCst);
    let rm = reader.collect().unwrap().metrics;

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(rm.metric("runtime.gc.count").unwrap().data.points()[0].value, NumberValue::I64(9));
}

#[test]
fn last_observation_in_a_pass_wins() {
    let reader = ManualReader::new();
    let provider = MeterProvider::builder().with_reader(reader.clone()).build().unwrap();
    let meter = provider.meter("svc");
    let gauge: ObservableGauge<f64> = meter.observable_gauge("cpu.temp").build().unwrap();
    let g = gauge.clone();
    meter
        .register_callback(
            move |obs: &mut Observations<'_>| -> Result<()> {
                obs.observe(&g, 40.0, &[]);
                obs.observe(&g, 42.5, &[]);
                Ok(())
            },
            &[&gauge],
        )
        .unwrap();

    let rm = reader.collect().unwrap().metrics;
    match &rm.metric("cpu.temp").unwrap().data {
        MetricData::Gauge { points } => {
            assert_eq!(points.len(), 1);
            assert_eq!(points[0].value, NumberValue::F64(42.5));
        }
        other => panic!("unexpected data {other:?}"),
    }
}

#[test]
fn unregistered_instrument_drops_contribution() {
    let reader = ManualReader::new();
    let provider = MeterProvider::builder().with_reader(reader.clone()).build().unwrap();
    let meter = provider.meter("svc");
    let allowed: ObservableGauge<i64> = meter.observable_gauge("allowed").build().unwrap();
    let other: ObservableGauge<i64> = meter.observable_gauge("other").build().unwrap();

    let (a, o) = (allowed.clone(), other.clone());
    meter
        .register_callback(
            move |obs: &mut Observations<'_>| -> Result<()> {
                obs.observe(&a, 1, &[]);
                obs.observe(&o, 2, &[]);
                Ok(())
            },
            &[&allowed],
        )
        .unwrap();

    let collection = reader.collect().unwrap();
    assert!(!collection.is_complete());
    assert_eq!(collection.errors[0].code(), ErrorCode::ContractViolation);
    assert!(collection.metrics.metric("allowed").is_none());
    assert!(collection.metrics.metric("other").is_none());
}

#[test]
fn failing_observer_does_not_abort_the_pass() {
    let reader = ManualReader::new();
    let provider = MeterProvider::builder().with_reader(reader.clone()).build().unwrap();
    let meter = provider.meter("svc");
    let good: ObservableGauge<i64> = meter.observable_gauge("good").build().unwrap();
    let bad: ObservableGauge<i64> = meter.observable_gauge("bad").build().unwrap();

    let b = bad.clone();
    meter
        .register_callback(
            move |obs: &mut Observations<'_>| -> Result<()> {
                obs.observe(&b, 1, &[]);
                Err(MeterError::Internal("sensor offline".into()))
            },
            &[&bad],
        )
        .unwrap();
    let g = good.clone();
    meter
        .register_callback(
            move |obs: &mut Observations<'_>| -> Result<()> {
                obs.observe(&g, 5, &[]);
                Ok(())
            },
            &[&good],
        )
        .unwrap();

    let (metrics, err) = reader.collect().unwrap().into_parts();
    assert_eq!(err.unwrap().code(), ErrorCode::Callback);
    assert!(metrics.metric("bad").is_none());
    assert_eq!(metrics.metric("good").unwrap().data.points()[0].value, NumberValue::I64(5));
}

#[test]
fn unregister_stops_invocations() {
    let reader = ManualReader::new();
    let (provider, observer) = setup(reader.clone());
    let runs = Arc::clone(&observer.runs);
    let counter = observer.counter.clone();
    let registration = provider
        .meter("runtime")
        .register_callback(observer, &[&counter])
        .unwrap();

    reader.collect().unwrap();
    registration.unregister().unwrap();
    registration.unregister().unwrap();
    let rm = reader.collect().unwrap().metrics;

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(rm.metric("runtime.gc.count").is_none());
}

#[test]
fn registration_requires_instruments_from_this_provider() {
    let (provider, _observer) = setup(ManualReader::new());
    let meter = provider.meter("svc");

    let err = meter
        .register_callback(|_: &mut Observations<'_>| -> Result<()> { Ok(()) }, &[])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ContractViolation);

    let foreign_provider = MeterProvider::builder().build().unwrap();
    let foreign: ObservableGauge<i64> = foreign_provider
        .meter("svc")
        .observable_gauge("foreign")
        .build()
        .unwrap();
    let err = meter
        .register_callback(|_: &mut Observations<'_>| -> Result<()> { Ok(()) }, &[&foreign])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::ContractViolation);
}

#[test]
fn panicking_observer_does_not_wedge_later_passes() {
    let reader = ManualReader::new();
    let provider = MeterProvider::builder().with_reader(reader.clone()).build().unwrap();
    let gauge = provider
        .meter("runtime")
        .observable_gauge::<i64>("heap.bytes")
        .build()
        .unwrap();
    let armed = Arc::new(std::sync::atomic::AtomicBool::new(true));
    let g = gauge.clone();
    let a = Arc::clone(&armed);
    provider
        .meter("runtime")
        .register_callback(
            move |obs: &mut Observations<'_>| -> Result<()> {
                if a.swap(false, Ordering::SeqCst) {
                    panic!("observer blew up");
                }
                obs.observe(&g, 512, &[]);
                Ok(())
            },
            &[&gauge],
        )
        .unwrap();

    let r = reader.clone();
    let crashed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || r.collect()));
    assert!(crashed.is_err());

    // the pass lock is poisoned now; the next pass still runs every observer
    let rm = reader.collect().unwrap().metrics;
    let points = rm.metric("heap.bytes").unwrap().data.points();
    assert_eq!(points[0].value, NumberValue::I64(512));
}
