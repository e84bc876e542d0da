#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use meterkit_core::resource::SERVICE_NAME;
use meterkit_core::{ErrorCode, Value};
use meterkit_gateway::config::{self, PeriodicExporter, ResourceEnv, TemporalityConfig};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
periodic:
  enabled: true
  intervall_ms: 1000 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.service.scope_name, "io.example.opentelemetry.runtime");
    assert_eq!(cfg.service.scope_version, "v1.1.1");
    assert_eq!(cfg.temporality, TemporalityConfig::Cumulative);
    assert!(cfg.pull.enabled);
    assert!(!cfg.periodic.enabled);
    assert_eq!(cfg.push.backoff(), meterkit_core::BackoffPolicy::default());
}

#[test]
fn full_config_parses() {
    let ok = r#"
version: 1
service:
  listen: "0.0.0.0:9090"
resource:
  attributes:
    service.name: ExampleApplication
    env: dev
    replicas: 3
temporality: delta
periodic:
  enabled: true
  interval_ms: 5000
  exporter: push
push:
  endpoint: "collector:4318"
  initial_interval_ms: 100
  max_interval_ms: 1000
views:
  - instrument: request.count
    rename: count.requests
  - instrument_prefix: "http."
    kind: histogram
    aggregation: histogram
    boundaries: [0, 5, 10]
  - instrument: noisy
    scope: io.example
    scope_version: "1.0"
    aggregation: drop
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.temporality, TemporalityConfig::Delta);
    assert_eq!(cfg.periodic.exporter, PeriodicExporter::Push);
    assert_eq!(cfg.resource.attributes.get("replicas"), Some(&Value::I64(3)));
    assert_eq!(cfg.compiled_views().unwrap().len(), 3);
}

#[test]
fn unsupported_version_fails() {
    let err = config::load_from_str("version: 2\n").unwrap_err();
    assert_eq!(err.code(), ErrorCode::Config);
}

#[test]
fn unknown_instrument_kind_is_fatal() {
    let bad = r#"
version: 1
views:
  - instrument: x
    kind: summary
"#;
    assert_eq!(config::load_from_str(bad).unwrap_err().code(), ErrorCode::Config);
}

#[test]
fn invalid_views_fail_at_load() {
    for bad in [
        // neither selector
        "version: 1\nviews:\n  - rename: y\n",
        // rename on a prefix
        "version: 1\nviews:\n  - instrument_prefix: a\n    rename: y\n",
        // boundaries without histogram aggregation
        "version: 1\nviews:\n  - instrument: a\n    boundaries: [1, 2]\n",
        // unsorted boundaries
        "version: 1\nviews:\n  - instrument: a\n    aggregation: histogram\n    boundaries: [2, 1]\n",
    ] {
        let err = config::load_from_str(bad).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Config, "{bad}");
    }
}

#[test]
fn out_of_range_values_fail() {
    for bad in [
        "version: 1\nperiodic:\n  interval_ms: 10\n",
        "version: 1\npush:\n  multiplier: 0.5\n",
        "version: 1\nservice:\n  listen: nowhere\n",
    ] {
        assert!(config::load_from_str(bad).is_err(), "{bad}");
    }
}

#[test]
fn resource_merge_order_is_default_then_file_then_env() {
    let cfg = config::load_from_str(
        r#"
version: 1
resource:
  attributes:
    service.name: ExampleApplication
    env: dev
"#,
    )
    .unwrap();

    let from_file = config::build_resource(&cfg.resource, &ResourceEnv::default()).unwrap();
    assert_eq!(from_file.get(SERVICE_NAME), Some(&Value::from("ExampleApplication")));
    assert_eq!(from_file.get("telemetry.sdk.name"), Some(&Value::from("meterkit")));

    let env = ResourceEnv {
        attributes: Some("env=prod,zone=a".into()),
        service_name: Some("checkout".into()),
    };
    let merged = config::build_resource(&cfg.resource, &env).unwrap();
    assert_eq!(merged.get(SERVICE_NAME), Some(&Value::from("checkout")));
    assert_eq!(merged.get("env"), Some(&Value::from("prod")));
    assert_eq!(merged.get("zone"), Some(&Value::from("a")));
}
