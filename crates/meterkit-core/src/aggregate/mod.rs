//! Synchronous aggregation.
//!
//! State is partitioned by attribute set. Each partition sits behind its own
//! mutex, so a recording call and a collection read of the same partition are
//! mutually atomic while different partitions (and different instruments)
//! never contend. The partition index is a `DashMap`; no guard of the index
//! is held while a partition lock is taken on the recording path.

mod histogram;
mod observed;
mod sum;

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::attributes::{AttributeSet, KeyValue};
use crate::data::MetricData;
use crate::instrument::Number;
use crate::sync::lock;

pub(crate) use histogram::Histogram;
pub(crate) use observed::fold_observations;
pub(crate) use sum::Sum;

/// Attribute key marking the set that absorbs measurements past the limit.
pub const OVERFLOW_KEY: &str = "otel.metric.overflow";

pub(crate) fn overflow_set() -> AttributeSet {
    AttributeSet::new(&[KeyValue::new(OVERFLOW_KEY, true)])
}

/// Recording side of an aggregator.
pub(crate) trait Measure<T: Number>: Send + Sync {
    fn measure(&self, value: T, attrs: &AttributeSet);
}

/// Collection side of an aggregator.
pub(crate) trait Collect: Send + Sync {
    /// `None` when there is nothing to report for this window.
    fn collect(&self, start_unix_nano: u64, now_unix_nano: u64) -> Option<MetricData>;
}

/// Partition state plus a marker set once a delta drain has detached it.
struct Slot<A> {
    state: A,
    stale: bool,
}

/// Attribute-partitioned state with a cardinality cap.
///
/// The cap counts live partitions: cumulative streams keep every set they
/// have seen, delta streams start each interval empty after `drain`.
pub(crate) struct ValueMap<A> {
    partitions: DashMap<AttributeSet, Arc<Mutex<Slot<A>>>>,
    allowed_keys: Option<Vec<String>>,
    limit: usize,
    init: Box<dyn Fn() -> A + Send + Sync>,
}

impl<A: Send + 'static> ValueMap<A> {
    pub(crate) fn new(
        allowed_keys: Option<Vec<String>>,
        limit: usize,
        init: impl Fn() -> A + Send + Sync + 'static,
    ) -> Self {
        Self {
            partitions: DashMap::new(),
            allowed_keys,
            limit: limit.max(1),
            init: Box::new(init),
        }
    }

    fn partition(&self, attrs: &AttributeSet) -> Arc<Mutex<Slot<A>>> {
        let filtered;
        let attrs = match &self.allowed_keys {
            Some(keys) => {
                filtered = attrs.filter_keys(keys);
                &filtered
            }
            None => attrs,
        };

        if let Some(p) = self.partitions.get(attrs) {
            return Arc::clone(p.value());
        }

        // the last slot is reserved for the overflow set
        let key = if self.partitions.len() >= self.limit - 1 {
            overflow_set()
        } else {
            attrs.clone()
        };
        let entry = self.partitions.entry(key).or_insert_with(|| {
            Arc::new(Mutex::new(Slot {
                state: (self.init)(),
                stale: false,
            }))
        });
        Arc::clone(entry.value())
    }

    /// Run `f` on the partition for `attrs` under its lock.
    pub(crate) fn update(&self, attrs: &AttributeSet, f: impl FnOnce(&mut A)) {
        let mut f = Some(f);
        loop {
            let partition = self.partition(attrs);
            let mut slot = lock(&partition);
            // drained between lookup and lock; record into the next interval
            if slot.stale {
                continue;
            }
            if let Some(f) = f.take() {
                f(&mut slot.state);
            }
            return;
        }
    }

    /// Visit every partition under its lock.
    pub(crate) fn for_each(&self, mut f: impl FnMut(&AttributeSet, &mut A)) {
        for entry in self.partitions.iter() {
            let mut slot = lock(entry.value());
            f(entry.key(), &mut slot.state);
        }
    }

    /// Detach every partition and hand its final state to `f`.
    ///
    /// A recorder still holding a detached partition sees it marked stale
    /// under the lock and retries against a fresh one, so no measurement
    /// lands in state that has already been read.
    pub(crate) fn drain(&self, mut f: impl FnMut(&AttributeSet, A)) {
        let keys: Vec<AttributeSet> = self.partitions.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            let Some((key, partition)) = self.partitions.remove(&key) else {
                continue;
            };
            let mut slot = lock(&partition);
            slot.stale = true;
            let state = std::mem::replace(&mut slot.state, (self.init)());
            drop(slot);
            f(&key, state);
        }
    }
}
