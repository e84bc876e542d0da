//! Gateway config loader (strict parsing).

pub mod schema;

use std::fs;

use meterkit_core::error::{MeterError, Result};
use meterkit_core::resource::SERVICE_NAME;
use meterkit_core::{KeyValue, Resource};

pub use schema::{
    AggregationConfig, ConsoleSection, KindConfig, MeterkitConfig, PeriodicExporter,
    PeriodicSection, PullSection, PushSection, ResourceSection, ServiceSection,
    TemporalityConfig, ViewConfig,
};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "METERKIT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "meterkit.yaml";

pub fn config_path() -> String {
    std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

pub fn load_from_file(path: &str) -> Result<MeterkitConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| MeterError::Config(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<MeterkitConfig> {
    let cfg: MeterkitConfig = serde_yaml::from_str(s)
        .map_err(|e| MeterError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resource overrides taken from the process environment.
#[derive(Debug, Default, Clone)]
pub struct ResourceEnv {
    /// `OTEL_RESOURCE_ATTRIBUTES`
    pub attributes: Option<String>,
    /// `OTEL_SERVICE_NAME`
    pub service_name: Option<String>,
}

impl ResourceEnv {
    pub fn from_process() -> Self {
        Self {
            attributes: std::env::var("OTEL_RESOURCE_ATTRIBUTES").ok(),
            service_name: std::env::var("OTEL_SERVICE_NAME").ok(),
        }
    }

    fn to_resource(&self) -> Resource {
        let mut resource = self
            .attributes
            .as_deref()
            .map(Resource::from_env_str)
            .unwrap_or_else(Resource::empty);
        if let Some(name) = self.service_name.as_deref().filter(|n| !n.trim().is_empty()) {
            resource = resource.with_attributes([KeyValue::new(SERVICE_NAME, name.trim())]);
        }
        resource
    }
}

/// Default resource, overridden by the config file, overridden by the
/// environment.
pub fn build_resource(section: &ResourceSection, env: &ResourceEnv) -> Result<Resource> {
    Resource::default()
        .merge(&section.to_resource())?
        .merge(&env.to_resource())
}
