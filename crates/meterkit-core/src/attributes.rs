//! Measurement attributes.
//!
//! An [`AttributeSet`] is the partition key for aggregation state: keys are
//! unique (later duplicates win) and stored sorted so that two sets built from
//! the same pairs in any order hash and compare equal.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Attribute value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            // bitwise so that Eq agrees with Hash
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Bool(b) => b.hash(state),
            Value::I64(i) => i.hash(state),
            Value::F64(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::I64(i) => write!(f, "{i}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// Key/value pair attached to a measurement or a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct KeyValue {
    pub key: String,
    pub value: Value,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Normalized, hashable set of attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AttributeSet(Vec<KeyValue>);

impl AttributeSet {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build from pairs; on duplicate keys the last pair wins.
    pub fn new(attrs: &[KeyValue]) -> Self {
        let mut out: Vec<KeyValue> = Vec::with_capacity(attrs.len());
        // reverse + stable sort + dedup keeps the last occurrence of each key
        for kv in attrs.iter().rev() {
            out.push(kv.clone());
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out.dedup_by(|later, earlier| later.key == earlier.key);
        Self(out)
    }

    /// Keep only the listed keys.
    pub fn filter_keys(&self, allowed: &[String]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|kv| allowed.iter().any(|k| k == &kv.key))
                .cloned()
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0
            .binary_search_by(|kv| kv.key.as_str().cmp(key))
            .ok()
            .map(|i| &self.0[i].value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[KeyValue]> for AttributeSet {
    fn from(attrs: &[KeyValue]) -> Self {
        AttributeSet::new(attrs)
    }
}
