//! View matching and stream overrides.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use meterkit_core::{
    Aggregation, ErrorCode, InstrumentKind, KeyValue, ManualReader, MeterProvider, MetricData,
    NumberValue, ObservableGauge, Observations, Pattern, Result, Scope, View,
};

fn provider_with(views: Vec<View>) -> (MeterProvider, ManualReader) {
    let reader = ManualReader::new();
    let mut builder = MeterProvider::builder().with_reader(reader.clone());
    for v in views {
        builder = builder.with_view(v);
    }
    (builder.build().unwrap(), reader)
}

#[test]
fn drop_view_removes_stream_but_still_runs_observers() {
    let (provider, reader) = provider_with(vec![
        View::builder(Pattern::exact("noisy")).drop().build().unwrap(),
        View::builder(Pattern::exact("noisy.gauge")).drop().build().unwrap(),
    ]);
    let meter = provider.meter("svc");
    let counter = meter.counter::<i64>("noisy").build().unwrap();
    let gauge: ObservableGauge<i64> = meter.observable_gauge("noisy.gauge").build().unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let (g, r) = (gauge.clone(), Arc::clone(&runs));
    meter
        .register_callback(
            move |obs: &mut Observations<'_>| -> Result<()> {
                r.fetch_add(1, Ordering::SeqCst);
                obs.observe(&g, 3, &[]);
                Ok(())
            },
            &[&gauge],
        )
        .unwrap();

    counter.add(10, &[]);
    let collection = reader.collect().unwrap();

    assert!(collection.is_complete());
    assert!(collection.metrics.metric("noisy").is_none());
    assert!(collection.metrics.metric("noisy.gauge").is_none());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn rename_view_reports_new_name() {
    let (provider, reader) = provider_with(vec![View::builder(Pattern::exact("request.count"))
        .rename("count.requests")
        .description("requests served")
        .build()
        .unwrap()]);
    provider
        .meter("svc")
        .counter::<i64>("request.count")
        .build()
        .unwrap()
        .add(1, &[]);

    let rm = reader.collect().unwrap().metrics;
    assert!(rm.metric("request.count").is_none());
    let metric = rm.metric("count.requests").unwrap();
    assert_eq!(metric.description, "requests served");
    assert_eq!(metric.data.points()[0].value, NumberValue::I64(1));
}

#[test]
fn prefix_view_overrides_histogram_boundaries() {
    let (provider, reader) = provider_with(vec![View::builder(Pattern::prefix("http."))
        .kind(InstrumentKind::Histogram)
        .aggregation(Aggregation::ExplicitBucketHistogram {
            boundaries: vec![1.0, 10.0],
            record_min_max: false,
        })
        .build()
        .unwrap()]);
    let meter = provider.meter("svc");
    let a = meter.histogram::<f64>("http.server.duration").build().unwrap();
    let b = meter
        .histogram::<f64>("http.client.duration")
        .with_boundaries(vec![100.0])
        .build()
        .unwrap();
    let c = meter.histogram::<f64>("db.duration").build().unwrap();
    for h in [&a, &b, &c] {
        h.record(5.0, &[]);
    }

    let rm = reader.collect().unwrap().metrics;
    for name in ["http.server.duration", "http.client.duration"] {
        let p = &rm.metric(name).unwrap().data.histogram_points()[0];
        assert_eq!(p.bounds, vec![1.0, 10.0]);
        assert_eq!(p.bucket_counts, vec![0, 1, 0]);
        assert_eq!(p.min, None);
    }
    let p = &rm.metric("db.duration").unwrap().data.histogram_points()[0];
    assert_eq!(p.bounds.len(), 15);
}

#[test]
fn scope_selector_requires_matching_version() {
    let (provider, reader) = provider_with(vec![View::builder(Pattern::exact("jobs"))
        .scope("worker", Some("1.0"))
        .drop()
        .build()
        .unwrap()]);
    provider
        .meter(Scope::new("worker").with_version("1.0"))
        .counter::<i64>("jobs")
        .build()
        .unwrap()
        .add(1, &[]);
    provider
        .meter(Scope::new("worker").with_version("2.0"))
        .counter::<i64>("jobs")
        .build()
        .unwrap()
        .add(2, &[]);

    let rm = reader.collect().unwrap().metrics;
    assert_eq!(rm.scope_metrics.len(), 1);
    assert_eq!(rm.scope_metrics[0].scope.version.as_deref(), Some("2.0"));
    assert_eq!(rm.metric("jobs").unwrap().data.points()[0].value, NumberValue::I64(2));
}

#[test]
fn attribute_filter_merges_partitions() {
    let (provider, reader) = provider_with(vec![View::builder(Pattern::exact("hits"))
        .allowed_attribute_keys(["method"])
        .build()
        .unwrap()]);
    let c = provider.meter("svc").counter::<i64>("hits").build().unwrap();
    c.add(1, &[KeyValue::new("method", "GET"), KeyValue::new("user", "a")]);
    c.add(1, &[KeyValue::new("method", "GET"), KeyValue::new("user", "b")]);

    let rm = reader.collect().unwrap().metrics;
    let points = rm.metric("hits").unwrap().data.points();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].attributes.len(), 1);
    assert_eq!(points[0].value, NumberValue::I64(2));
}

#[test]
fn first_matching_view_wins() {
    let (provider, reader) = provider_with(vec![
        View::builder(Pattern::exact("c")).rename("first").build().unwrap(),
        View::builder(Pattern::prefix("c")).drop().build().unwrap(),
    ]);
    provider.meter("svc").counter::<i64>("c").build().unwrap().add(1, &[]);

    let rm = reader.collect().unwrap().metrics;
    assert!(rm.metric("first").is_some());
}

#[test]
fn incompatible_aggregation_falls_back_to_default() {
    let (provider, reader) = provider_with(vec![View::builder(Pattern::exact("c"))
        .aggregation(Aggregation::LastValue)
        .build()
        .unwrap()]);
    provider.meter("svc").counter::<i64>("c").build().unwrap().add(4, &[]);

    let rm = reader.collect().unwrap().metrics;
    assert!(matches!(
        rm.metric("c").unwrap().data,
        MetricData::Sum { monotonic: true, .. }
    ));
}

#[test]
fn sum_view_on_histogram_reports_a_sum() {
    let (provider, reader) = provider_with(vec![View::builder(Pattern::exact("latency"))
        .aggregation(Aggregation::Sum)
        .build()
        .unwrap()]);
    let h = provider.meter("svc").histogram::<i64>("latency").build().unwrap();
    h.record(3, &[]);
    h.record(4, &[]);

    let rm = reader.collect().unwrap().metrics;
    assert_eq!(rm.metric("latency").unwrap().data.points()[0].value, NumberValue::I64(7));
}

#[test]
fn invalid_views_are_rejected_at_build() {
    let err = View::builder(Pattern::prefix("http."))
        .rename("merged")
        .build()
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidView);

    let err = View::builder(Pattern::exact("x"))
        .aggregation(Aggregation::ExplicitBucketHistogram {
            boundaries: vec![1.0, f64::INFINITY],
            record_min_max: true,
        })
        .build()
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidView);

    let err = View::builder(Pattern::exact("x")).cardinality_limit(0).build().unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidView);

    let err = View::builder(Pattern::exact("x")).rename("9lives").build().unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidView);
}
