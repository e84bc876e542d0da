//! Instrument kinds, numeric types and descriptors.

use std::fmt;

use serde::Serialize;

use crate::error::{MeterError, Result};
use crate::resource::Scope;

/// The six instrument kinds. Closed set: every `match` over it is exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InstrumentKind {
    Counter,
    UpDownCounter,
    Histogram,
    ObservableCounter,
    ObservableUpDownCounter,
    ObservableGauge,
}

impl InstrumentKind {
    /// Recorded inline by the caller (as opposed to observed in a callback).
    pub fn is_synchronous(self) -> bool {
        matches!(
            self,
            InstrumentKind::Counter | InstrumentKind::UpDownCounter | InstrumentKind::Histogram
        )
    }

    /// Sums for these kinds never decrease.
    pub fn is_monotonic(self) -> bool {
        matches!(
            self,
            InstrumentKind::Counter | InstrumentKind::ObservableCounter | InstrumentKind::Histogram
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InstrumentKind::Counter => "counter",
            InstrumentKind::UpDownCounter => "up_down_counter",
            InstrumentKind::Histogram => "histogram",
            InstrumentKind::ObservableCounter => "observable_counter",
            InstrumentKind::ObservableUpDownCounter => "observable_up_down_counter",
            InstrumentKind::ObservableGauge => "observable_gauge",
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NumberKind {
    I64,
    F64,
}

/// A single numeric value as it appears in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NumberValue {
    I64(i64),
    F64(f64),
}

impl NumberValue {
    pub fn as_f64(self) -> f64 {
        match self {
            NumberValue::I64(v) => v as f64,
            NumberValue::F64(v) => v,
        }
    }

    pub fn as_i64(self) -> Option<i64> {
        match self {
            NumberValue::I64(v) => Some(v),
            NumberValue::F64(_) => None,
        }
    }
}

impl fmt::Display for NumberValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumberValue::I64(v) => write!(f, "{v}"),
            NumberValue::F64(v) => write!(f, "{v}"),
        }
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for i64 {}
    impl Sealed for f64 {}
}

/// Numeric types an instrument can be declared over.
pub trait Number:
    sealed::Sealed + Copy + PartialOrd + Default + fmt::Debug + Send + Sync + 'static
{
    const KIND: NumberKind;
    const MAX: Self;
    const MIN: Self;

    /// `None` when the result cannot be represented.
    fn checked_add(self, rhs: Self) -> Option<Self>;

    /// Finite for floats; always true for integers.
    fn is_valid(self) -> bool;

    fn is_negative(self) -> bool;

    fn as_f64(self) -> f64;

    fn into_value(self) -> NumberValue;

    /// Add, saturating at the type bounds. Returns whether it saturated.
    fn saturating_add_flag(self, rhs: Self) -> (Self, bool) {
        match self.checked_add(rhs) {
            Some(v) => (v, false),
            None if rhs.is_negative() => (Self::MIN, true),
            None => (Self::MAX, true),
        }
    }
}

impl Number for i64 {
    const KIND: NumberKind = NumberKind::I64;
    const MAX: Self = i64::MAX;
    const MIN: Self = i64::MIN;

    fn checked_add(self, rhs: Self) -> Option<Self> {
        i64::checked_add(self, rhs)
    }

    fn is_valid(self) -> bool {
        true
    }

    fn is_negative(self) -> bool {
        self < 0
    }

    fn as_f64(self) -> f64 {
        self as f64
    }

    fn into_value(self) -> NumberValue {
        NumberValue::I64(self)
    }
}

impl Number for f64 {
    const KIND: NumberKind = NumberKind::F64;
    const MAX: Self = f64::MAX;
    const MIN: Self = f64::MIN;

    fn checked_add(self, rhs: Self) -> Option<Self> {
        let sum = self + rhs;
        sum.is_finite().then_some(sum)
    }

    fn is_valid(self) -> bool {
        self.is_finite()
    }

    fn is_negative(self) -> bool {
        self < 0.0
    }

    fn as_f64(self) -> f64 {
        self
    }

    fn into_value(self) -> NumberValue {
        NumberValue::F64(self)
    }
}

/// Identity of an instrument: scope-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrumentId {
    pub scope: Scope,
    pub name: String,
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope.name, self.name)
    }
}

/// Full definition of an instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentDescriptor {
    pub scope: Scope,
    pub name: String,
    pub description: String,
    pub unit: String,
    pub kind: InstrumentKind,
    pub number: NumberKind,
    /// Advisory histogram boundaries; views take precedence.
    pub boundaries: Option<Vec<f64>>,
}

impl InstrumentDescriptor {
    pub fn id(&self) -> InstrumentId {
        InstrumentId {
            scope: self.scope.clone(),
            name: self.name.clone(),
        }
    }

    /// Reason why `other` cannot share this descriptor's identity, if any.
    pub(crate) fn incompatibility(&self, other: &InstrumentDescriptor) -> Option<String> {
        if self.kind != other.kind {
            return Some(format!("kind {} != {}", self.kind, other.kind));
        }
        if self.number != other.number {
            return Some(format!("number {:?} != {:?}", self.number, other.number));
        }
        if self.unit != other.unit {
            return Some(format!("unit {:?} != {:?}", self.unit, other.unit));
        }
        if self.description != other.description {
            return Some("description differs".to_string());
        }
        if self.boundaries != other.boundaries {
            return Some("advisory boundaries differ".to_string());
        }
        None
    }
}

/// Default explicit bucket boundaries for histograms.
pub const DEFAULT_BOUNDARIES: [f64; 15] = [
    0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 750.0, 1000.0, 2500.0, 5000.0,
    7500.0, 10000.0,
];

/// Names: an ASCII letter followed by up to 254 of `[A-Za-z0-9_.-/]`.
pub fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_first = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/'));
    if !valid_first || !valid_rest || name.len() > 255 {
        return Err(MeterError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Boundaries must be finite and strictly increasing.
pub fn validate_boundaries(bounds: &[f64]) -> Result<()> {
    if bounds.iter().any(|b| !b.is_finite()) {
        return Err(MeterError::InvalidView(
            "histogram boundaries must be finite".into(),
        ));
    }
    if bounds.windows(2).any(|w| w[0] >= w[1]) {
        return Err(MeterError::InvalidView(
            "histogram boundaries must be strictly increasing".into(),
        ));
    }
    Ok(())
}
