//! Temporality: whether a stream reports deltas since the last collection
//! or totals since start.

use std::fmt;

use serde::Serialize;

use crate::instrument::InstrumentKind;

/// Window an aggregation was calculated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Temporality {
    /// Grows forward from the provider start time.
    Cumulative,
    /// Resets every collection cycle.
    Delta,
}

/// Per-reader policy mapping instrument kinds to temporality.
pub trait TemporalitySelector: fmt::Debug + Send + Sync + 'static {
    fn temporality(&self, kind: InstrumentKind) -> Temporality;
}

/// Everything cumulative. Required by pull-based exposition.
#[derive(Debug, Clone, Copy, Default)]
pub struct CumulativeOnly;

impl TemporalitySelector for CumulativeOnly {
    fn temporality(&self, _kind: InstrumentKind) -> Temporality {
        Temporality::Cumulative
    }
}

/// Delta where it is meaningful, cumulative for the up/down kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeltaPreferred;

impl TemporalitySelector for DeltaPreferred {
    fn temporality(&self, kind: InstrumentKind) -> Temporality {
        match kind {
            InstrumentKind::Counter
            | InstrumentKind::Histogram
            | InstrumentKind::ObservableGauge
            | InstrumentKind::ObservableCounter => Temporality::Delta,
            InstrumentKind::UpDownCounter | InstrumentKind::ObservableUpDownCounter => {
                Temporality::Cumulative
            }
        }
    }
}
