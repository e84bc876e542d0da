//! Static metadata attached to every snapshot: the resource (who is
//! reporting) and instrumentation scopes (which component owns an
//! instrument).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::attributes::{KeyValue, Value};
use crate::error::{MeterError, Result};

pub const SERVICE_NAME: &str = "service.name";
const SDK_NAME: &str = "telemetry.sdk.name";
const SDK_LANGUAGE: &str = "telemetry.sdk.language";
const SDK_VERSION: &str = "telemetry.sdk.version";

/// Instrumentation scope. Part of every instrument's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Scope {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_url: Option<String>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            schema_url: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_schema_url(mut self, url: impl Into<String>) -> Self {
        self.schema_url = Some(url.into());
        self
    }
}

impl From<&str> for Scope {
    fn from(name: &str) -> Self {
        Scope::new(name)
    }
}

/// Resource attributes plus optional schema URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    attributes: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema_url: Option<String>,
}

impl Default for Resource {
    fn default() -> Self {
        Self::empty().with_attributes([
            KeyValue::new(SERVICE_NAME, "unknown_service"),
            KeyValue::new(SDK_NAME, "meterkit"),
            KeyValue::new(SDK_LANGUAGE, "rust"),
            KeyValue::new(SDK_VERSION, env!("CARGO_PKG_VERSION")),
        ])
    }
}

impl Resource {
    pub fn empty() -> Self {
        Self {
            attributes: BTreeMap::new(),
            schema_url: None,
        }
    }

    pub fn new(attrs: impl IntoIterator<Item = KeyValue>) -> Self {
        Self::empty().with_attributes(attrs)
    }

    pub fn with_attributes(mut self, attrs: impl IntoIterator<Item = KeyValue>) -> Self {
        for kv in attrs {
            self.attributes.insert(kv.key, kv.value);
        }
        self
    }

    pub fn with_schema_url(mut self, url: impl Into<String>) -> Self {
        self.schema_url = Some(url.into());
        self
    }

    /// Parse `OTEL_RESOURCE_ATTRIBUTES` style input: `k=v,k2=v2`.
    /// Malformed pairs are skipped.
    pub fn from_env_str(raw: &str) -> Self {
        let mut attrs = Vec::new();
        for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match pair.split_once('=') {
                Some((k, v)) if !k.trim().is_empty() => {
                    attrs.push(KeyValue::new(k.trim(), v.trim()));
                }
                _ => tracing::warn!(pair = %pair, "skipping malformed resource attribute"),
            }
        }
        Self::new(attrs)
    }

    /// Merge `other` into `self`; `other` wins on key collisions.
    pub fn merge(&self, other: &Resource) -> Result<Resource> {
        let schema_url = match (&self.schema_url, &other.schema_url) {
            (None, None) => None,
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (Some(a), Some(b)) if a == b => Some(a.clone()),
            (Some(a), Some(b)) => {
                return Err(MeterError::SchemaUrlConflict(a.clone(), b.clone()));
            }
        };

        let mut attributes = self.attributes.clone();
        for (k, v) in &other.attributes {
            attributes.insert(k.clone(), v.clone());
        }
        Ok(Resource {
            attributes,
            schema_url,
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes.iter()
    }

    pub fn schema_url(&self) -> Option<&str> {
        self.schema_url.as_deref()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
