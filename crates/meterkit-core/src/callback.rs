//! Asynchronous callback registry.
//!
//! Observers are never run on their own schedule: a reader's collection pass
//! invokes every registered observer exactly once, in registration order,
//! with a sink that only accepts the instruments the observer was registered
//! for. Each observer's observations are buffered and committed only when it
//! completes cleanly, so one failing observer never taints the others.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use crate::attributes::{AttributeSet, KeyValue};
use crate::error::{MeterError, Result};
use crate::instrument::{InstrumentId, InstrumentKind, Number, NumberValue};
use crate::sync::{read, write};

/// Opaque handle shared by every observable instrument type.
#[derive(Debug, Clone)]
pub struct ObservableHandle {
    pub(crate) provider: u64,
    pub(crate) id: Arc<InstrumentId>,
    pub(crate) kind: InstrumentKind,
}

impl ObservableHandle {
    pub fn id(&self) -> &InstrumentId {
        &self.id
    }

    pub fn kind(&self) -> InstrumentKind {
        self.kind
    }

    fn same(&self, other: &ObservableHandle) -> bool {
        self.provider == other.provider && self.id == other.id
    }
}

/// Implemented by the observable instrument handles.
pub trait AsObservable {
    fn observable(&self) -> &ObservableHandle;
}

/// Typed observable: binds the value type an observer must report.
pub trait Observable<T: Number>: AsObservable {}

/// Observation sink handed to an observer during a pass.
pub struct Observations<'a> {
    allowed: &'a [ObservableHandle],
    buffer: Vec<(ObservableHandle, AttributeSet, NumberValue)>,
    violation: Option<String>,
}

impl<'a> Observations<'a> {
    fn new(allowed: &'a [ObservableHandle]) -> Self {
        Self {
            allowed,
            buffer: Vec::new(),
            violation: None,
        }
    }

    /// Report the current absolute value of `instrument`.
    pub fn observe<T: Number>(&mut self, instrument: &impl Observable<T>, value: T, attrs: &[KeyValue]) {
        let handle = instrument.observable();
        if !self.allowed.iter().any(|h| h.same(handle)) {
            // keep the first violation; the whole contribution is dropped anyway
            if self.violation.is_none() {
                self.violation = Some(format!(
                    "observed {} which this observer is not registered for",
                    handle.id
                ));
            }
            return;
        }
        if !value.is_valid() {
            tracing::warn!(instrument = %handle.id, "discarding non-finite observation");
            return;
        }
        self.buffer
            .push((handle.clone(), AttributeSet::new(attrs), value.into_value()));
    }
}

/// A stateful observer. Closures taking `&mut Observations` qualify too.
pub trait Observer: Send + Sync + 'static {
    fn observe(&self, observations: &mut Observations<'_>) -> Result<()>;
}

impl<F> Observer for F
where
    F: Fn(&mut Observations<'_>) -> Result<()> + Send + Sync + 'static,
{
    fn observe(&self, observations: &mut Observations<'_>) -> Result<()> {
        self(observations)
    }
}

struct Entry {
    observer: Arc<dyn Observer>,
    instruments: Arc<[ObservableHandle]>,
}

/// Observations gathered by one pass, keyed by instrument identity.
#[derive(Default)]
pub(crate) struct PassObservations {
    pub(crate) values: HashMap<Arc<InstrumentId>, Vec<(AttributeSet, NumberValue)>>,
    pub(crate) errors: Vec<MeterError>,
}

pub(crate) struct CallbackRegistry {
    provider: u64,
    next_id: AtomicU64,
    entries: RwLock<BTreeMap<u64, Entry>>,
}

impl CallbackRegistry {
    pub(crate) fn new(provider: u64) -> Self {
        Self {
            provider,
            next_id: AtomicU64::new(1),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub(crate) fn register(
        self: &Arc<Self>,
        observer: Arc<dyn Observer>,
        instruments: &[&dyn AsObservable],
    ) -> Result<Registration> {
        if instruments.is_empty() {
            return Err(MeterError::ContractViolation(
                "observer must be registered with at least one instrument".into(),
            ));
        }
        let handles: Vec<ObservableHandle> =
            instruments.iter().map(|i| i.observable().clone()).collect();
        if let Some(foreign) = handles.iter().find(|h| h.provider != self.provider) {
            return Err(MeterError::ContractViolation(format!(
                "instrument {} belongs to a different meter provider",
                foreign.id
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            observer,
            instruments: handles.into(),
        };
        write(&self.entries).insert(id, entry);

        Ok(Registration {
            id,
            registry: Arc::downgrade(self),
        })
    }

    fn remove(&self, id: u64) {
        write(&self.entries).remove(&id);
    }

    /// Invoke every observer once.
    pub(crate) fn run(&self) -> PassObservations {
        // snapshot so observers may (un)register without deadlocking
        let entries: Vec<(u64, Arc<dyn Observer>, Arc<[ObservableHandle]>)> = read(&self.entries)
            .iter()
            .map(|(id, e)| (*id, Arc::clone(&e.observer), Arc::clone(&e.instruments)))
            .collect();

        let mut pass = PassObservations::default();
        for (id, observer, instruments) in entries {
            let mut sink = Observations::new(&instruments);
            match observer.observe(&mut sink) {
                Ok(()) => {
                    if let Some(msg) = sink.violation {
                        tracing::warn!(observer = id, error = %msg, "dropping observer contribution");
                        pass.errors.push(MeterError::ContractViolation(msg));
                        continue;
                    }
                    for (handle, attrs, value) in sink.buffer {
                        pass.values.entry(handle.id).or_default().push((attrs, value));
                    }
                }
                Err(e) => {
                    tracing::warn!(observer = id, error = %e, "observer failed");
                    pass.errors.push(MeterError::callback(id, e));
                }
            }
        }
        pass
    }
}

/// Returned by `Meter::register_callback`; keep it to unregister later.
#[derive(Debug)]
pub struct Registration {
    id: u64,
    registry: Weak<CallbackRegistry>,
}

impl Registration {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop invoking the observer. Unregistering twice is a no-op.
    pub fn unregister(&self) -> Result<()> {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
        Ok(())
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}
