use std::sync::atomic::{AtomicI64, Ordering};

use rand::Rng;

use meterkit_core::error::Result;
use meterkit_core::{ObservableCounter, Observations, Observer};

/// Reports a simulated, ever-growing garbage collection count.
///
/// Stateful: the count lives in the observer and only advances when a
/// collection pass invokes it.
pub struct GcObserver {
    collections: AtomicI64,
    counter: ObservableCounter<i64>,
}

impl GcObserver {
    pub fn new(counter: ObservableCounter<i64>) -> Self {
        Self {
            collections: AtomicI64::new(0),
            counter,
        }
    }

    pub fn counter(&self) -> &ObservableCounter<i64> {
        &self.counter
    }
}

impl Observer for GcObserver {
    fn observe(&self, obs: &mut Observations<'_>) -> Result<()> {
        let step = rand::rng().random_range(0..4i64);
        let total = self.collections.fetch_add(step, Ordering::Relaxed) + step;
        obs.observe(&self.counter, total, &[]);
        tracing::info!(collections = total, "garbage collections observed");
        Ok(())
    }
}
