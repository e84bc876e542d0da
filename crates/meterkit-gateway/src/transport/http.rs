//! Demo HTTP handlers.
//!
//! - `/`            : simulated request (counted and timed)
//! - `/v1/collect`  : manual collection, printed to the console and returned

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use meterkit_core::error::{ErrorCode, MeterError};
use meterkit_core::ResourceMetrics;

use crate::app_state::AppState;

pub async fn work(State(state): State<AppState>) -> StatusCode {
    let took = state.work().handle().await;
    tracing::debug!(ms = took.as_millis() as u64, "request handled");
    StatusCode::OK
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub msg: String,
}

impl From<&MeterError> for ErrorBody {
    fn from(e: &MeterError) -> Self {
        Self {
            code: e.code().as_str(),
            msg: e.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CollectBody {
    pub metrics: ResourceMetrics,
    /// Observer failures that did not abort the pass.
    pub errors: Vec<ErrorBody>,
}

pub async fn collect(State(state): State<AppState>) -> Response {
    match state.collect_console().await {
        Ok(collection) => Json(CollectBody {
            errors: collection.errors.iter().map(ErrorBody::from).collect(),
            metrics: collection.metrics,
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Map an engine error onto an HTTP response with a stable code.
pub fn error_response(err: &MeterError) -> Response {
    let status = match err.code() {
        ErrorCode::Closed => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Config | ErrorCode::InvalidView | ErrorCode::InvalidName => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::warn!(code = err.code().as_str(), error = %err, "request failed");
    }
    (status, Json(ErrorBody::from(err))).into_response()
}
