//! Composition root: demo instruments, console collection, pull scrape and
//! shutdown.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use meterkit_core::MeterError;
use meterkit_gateway::app_state::AppState;
use meterkit_gateway::config::{self, ResourceEnv};
use meterkit_gateway::ops;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

fn state(yaml: &str, buf: SharedBuf) -> AppState {
    let cfg = config::load_from_str(yaml).unwrap();
    let env = ResourceEnv {
        attributes: None,
        service_name: Some("app-test".into()),
    };
    AppState::with_console(cfg, env, buf).unwrap()
}

#[tokio::test]
async fn console_collection_reports_demo_instruments() {
    let buf = SharedBuf::default();
    let state = state("version: 1\n", buf.clone());

    state.work().handle().await;
    state.work().handle().await;

    let collection = state.collect_console().await.unwrap();
    assert!(collection.is_complete());

    let rm = &collection.metrics;
    assert_eq!(rm.resource.get("service.name").unwrap().to_string(), "app-test");
    let count = rm.metric("request.count").unwrap();
    assert_eq!(count.data.points()[0].value.as_f64(), 2.0);
    let duration = rm.metric("request.duration").unwrap();
    assert_eq!(duration.unit, "ms");
    assert_eq!(duration.data.histogram_points()[0].count, 2);
    assert!(rm.metric("runtime.gc.count").is_some());

    let printed: serde_json::Value = serde_json::from_str(&buf.text()).unwrap();
    let scope = &printed["scope_metrics"][0]["scope"];
    assert_eq!(scope["name"], "io.example.opentelemetry.runtime");
    assert_eq!(scope["version"], "v1.1.1");
}

#[tokio::test]
async fn pull_scrape_renders_prometheus_text() {
    let state = state("version: 1\n", SharedBuf::default());
    state.work().handle().await;

    let body = state.scrape().await.unwrap().unwrap();
    assert!(body.contains("target_info{service_name=\"app-test\""));
    assert!(body.contains("# TYPE request_count_total counter"));
    assert!(body.contains("request_duration_bucket{"));

    let resp = ops::metrics(State(state.clone())).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn scrape_is_not_found_when_pull_disabled() {
    let state = state("version: 1\npull:\n  enabled: false\n", SharedBuf::default());

    assert!(state.scrape().await.unwrap().is_none());
    let resp = ops::metrics(State(state)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn shutdown_drains_and_prints_final_pass() {
    let buf = SharedBuf::default();
    let state = state("version: 1\n", buf.clone());
    state.work().handle().await;

    let ready = ops::readyz(State(state.clone())).await.into_response();
    assert_eq!(ready.status(), StatusCode::OK);

    state.shutdown().await.unwrap();

    assert!(state.is_draining());
    let ready = ops::readyz(State(state.clone())).await.into_response();
    assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);

    let printed: serde_json::Value = serde_json::from_str(&buf.text()).unwrap();
    assert!(printed["scope_metrics"][0]["metrics"].is_array());

    let err = state.collect_console().await.unwrap_err();
    assert!(matches!(err, MeterError::Closed));
    let resp = ops::metrics(State(state)).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn delta_config_resets_request_count_between_passes() {
    let state = state("version: 1\ntemporality: delta\n", SharedBuf::default());

    state.work().handle().await;
    let first = state.collect_console().await.unwrap().metrics;
    assert_eq!(
        first.metric("request.count").unwrap().data.points()[0].value.as_f64(),
        1.0
    );

    let second = state.collect_console().await.unwrap().metrics;
    assert!(second
        .metric("request.count")
        .map_or(true, |m| m.data.points().is_empty()));

    // the scrape reader keeps totals
    let body = state.scrape().await.unwrap().unwrap();
    assert!(body.contains("request_count_total{otel_scope_name=\"io.example.opentelemetry.runtime\"} 1"));
}

#[tokio::test]
async fn console_trigger_collects_once_per_line() {
    let buf = SharedBuf::default();
    let state = state("version: 1\n", buf.clone());

    meterkit_gateway::transport::console::run(state, "\n\n".as_bytes()).await;

    let text = buf.text();
    let docs = serde_json::Deserializer::from_str(&text)
        .into_iter::<serde_json::Value>()
        .count();
    assert_eq!(docs, 2);
}
