//! meterkit gateway library entry.
//!
//! Runtime-bound pieces around `meterkit-core`: config loading, the periodic
//! reader, stdout/push/Prometheus exporters, and the demo HTTP service that
//! exercises them. Consumed by the binary (`main.rs`) and integration tests.

pub mod app_state;
pub mod config;
pub mod export;
pub mod ops;
pub mod reader;
pub mod router;
pub mod services;
pub mod transport;
