//! Prometheus text rendering of collected snapshots.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use meterkit_core::{KeyValue, ManualReader, MeterProvider, Resource, Scope};
use meterkit_gateway::export::prometheus::{render, sanitize_name};

#[test]
fn names_are_sanitized() {
    assert_eq!(sanitize_name("request.duration"), "request_duration");
    assert_eq!(sanitize_name("http/server-latency"), "http_server_latency");
    assert_eq!(sanitize_name("9lives"), "_9lives");
}

#[test]
fn renders_counters_gauges_and_histograms() {
    let reader = ManualReader::new();
    let provider = MeterProvider::builder()
        .with_resource(Resource::new([KeyValue::new("service.name", "demo")]))
        .with_reader(reader.clone())
        .build()
        .unwrap();
    let meter = provider.meter(Scope::new("rt"));

    let count = meter
        .counter::<i64>("request.count")
        .with_description("How many requests we get")
        .build()
        .unwrap();
    count.add(3, &[KeyValue::new("method", "GET")]);

    let depth = meter.up_down_counter::<i64>("queue.depth").build().unwrap();
    depth.add(-2, &[]);

    let h = meter
        .histogram::<i64>("request.duration")
        .with_boundaries(vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0])
        .build()
        .unwrap();
    for v in [1, 3, 5, 11] {
        h.record(v, &[]);
    }

    let text = render(&reader.collect().unwrap().metrics);

    assert!(text.contains("target_info{service_name=\"demo\"} 1"));
    assert!(text.contains("# HELP request_count_total How many requests we get"));
    assert!(text.contains("# TYPE request_count_total counter"));
    assert!(text.contains("request_count_total{otel_scope_name=\"rt\",method=\"GET\"} 3"));
    assert!(text.contains("# TYPE queue_depth gauge"));
    assert!(text.contains("queue_depth{otel_scope_name=\"rt\"} -2"));
    assert!(text.contains("# TYPE request_duration histogram"));
    assert!(text.contains("request_duration_bucket{otel_scope_name=\"rt\",le=\"0\"} 0"));
    assert!(text.contains("request_duration_bucket{otel_scope_name=\"rt\",le=\"2\"} 1"));
    assert!(text.contains("request_duration_bucket{otel_scope_name=\"rt\",le=\"6\"} 3"));
    assert!(text.contains("request_duration_bucket{otel_scope_name=\"rt\",le=\"10\"} 3"));
    assert!(text.contains("request_duration_bucket{otel_scope_name=\"rt\",le=\"+Inf\"} 4"));
    assert!(text.contains("request_duration_sum{otel_scope_name=\"rt\"} 20"));
    assert!(text.contains("request_duration_count{otel_scope_name=\"rt\"} 4"));
}

#[test]
fn label_values_are_escaped() {
    let reader = ManualReader::new();
    let provider = MeterProvider::builder().with_reader(reader.clone()).build().unwrap();
    provider
        .meter("rt")
        .counter::<i64>("c")
        .build()
        .unwrap()
        .add(1, &[KeyValue::new("path", "a\"b\\c")]);

    let text = render(&reader.collect().unwrap().metrics);
    assert!(text.contains(r#"path="a\"b\\c""#));
}

#[test]
fn same_stream_from_two_scopes_shares_one_header() {
    let reader = ManualReader::new();
    let provider = MeterProvider::builder().with_reader(reader.clone()).build().unwrap();
    for scope in ["billing", "search"] {
        provider
            .meter(scope)
            .counter::<i64>("request.count")
            .with_description("Requests served")
            .build()
            .unwrap()
            .add(2, &[]);
    }
    // same exposed name, different type: not exposable next to the counters
    provider
        .meter("legacy")
        .up_down_counter::<i64>("request.count_total")
        .build()
        .unwrap()
        .add(1, &[]);

    let text = render(&reader.collect().unwrap().metrics);

    assert_eq!(text.matches("# TYPE request_count_total ").count(), 1);
    assert_eq!(text.matches("# HELP request_count_total ").count(), 1);
    assert!(text.contains("request_count_total{otel_scope_name=\"billing\"} 2"));
    assert!(text.contains("request_count_total{otel_scope_name=\"search\"} 2"));
    assert!(!text.contains("otel_scope_name=\"legacy\""));
}
