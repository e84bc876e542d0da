//! Meters and instrument handles.
//!
//! Synchronous handles (`Counter`, `UpDownCounter`, `Histogram`) only expose
//! recording methods; observable handles only exist to be registered with an
//! observer and reported through its `Observations` sink.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::aggregate::Measure;
use crate::attributes::{AttributeSet, KeyValue};
use crate::callback::{AsObservable, Observable, ObservableHandle, Observer, Registration};
use crate::error::{MeterError, Result};
use crate::instrument::{
    validate_boundaries, validate_name, InstrumentDescriptor, InstrumentId, InstrumentKind, Number,
    NumberKind,
};
use crate::provider::ProviderInner;
use crate::resource::Scope;

pub(crate) struct SyncInstrument<T: Number> {
    id: InstrumentId,
    measures: Vec<Arc<dyn Measure<T>>>,
}

impl<T: Number> SyncInstrument<T> {
    fn record(&self, value: T, attrs: &[KeyValue]) {
        if !value.is_valid() {
            tracing::warn!(instrument = %self.id, "discarding non-finite measurement");
            return;
        }
        let attrs = AttributeSet::new(attrs);
        for m in &self.measures {
            m.measure(value, &attrs);
        }
    }
}

/// Monotonic sum, recorded inline.
pub struct Counter<T: Number> {
    inner: Arc<SyncInstrument<T>>,
}

impl<T: Number> Counter<T> {
    /// Add a non-negative increment. Negative increments are discarded.
    pub fn add(&self, value: T, attrs: &[KeyValue]) {
        if value.is_negative() {
            tracing::warn!(
                error = %MeterError::ContractViolation(format!("negative increment on counter {}", self.inner.id)),
                "discarding measurement"
            );
            return;
        }
        self.inner.record(value, attrs);
    }
}

/// Non-monotonic sum, recorded inline.
pub struct UpDownCounter<T: Number> {
    inner: Arc<SyncInstrument<T>>,
}

impl<T: Number> UpDownCounter<T> {
    pub fn add(&self, value: T, attrs: &[KeyValue]) {
        self.inner.record(value, attrs);
    }
}

/// Distribution of recorded values.
pub struct Histogram<T: Number> {
    inner: Arc<SyncInstrument<T>>,
}

impl<T: Number> Histogram<T> {
    pub fn record(&self, value: T, attrs: &[KeyValue]) {
        self.inner.record(value, attrs);
    }
}

macro_rules! sync_handle_impls {
    ($($ty:ident),*) => {$(
        impl<T: Number> Clone for $ty<T> {
            fn clone(&self) -> Self {
                Self { inner: Arc::clone(&self.inner) }
            }
        }

        impl<T: Number> fmt::Debug for $ty<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty)).field("id", &self.inner.id).finish()
            }
        }
    )*};
}

sync_handle_impls!(Counter, UpDownCounter, Histogram);

macro_rules! observable_handle {
    ($(#[$doc:meta])* $ty:ident) => {
        $(#[$doc])*
        pub struct $ty<T: Number> {
            handle: ObservableHandle,
            _value: PhantomData<fn() -> T>,
        }

        impl<T: Number> Clone for $ty<T> {
            fn clone(&self) -> Self {
                Self { handle: self.handle.clone(), _value: PhantomData }
            }
        }

        impl<T: Number> fmt::Debug for $ty<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty)).field("id", self.handle.id()).finish()
            }
        }

        impl<T: Number> AsObservable for $ty<T> {
            fn observable(&self) -> &ObservableHandle {
                &self.handle
            }
        }

        impl<T: Number> Observable<T> for $ty<T> {}
    };
}

observable_handle!(
    /// Monotonic sum reported as an absolute value by an observer.
    ObservableCounter
);
observable_handle!(
    /// Non-monotonic sum reported as an absolute value by an observer.
    ObservableUpDownCounter
);
observable_handle!(
    /// Point-in-time value reported by an observer.
    ObservableGauge
);

/// Creates instruments within one scope.
#[derive(Clone)]
pub struct Meter {
    scope: Scope,
    provider: Arc<ProviderInner>,
}

impl fmt::Debug for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meter").field("scope", &self.scope).finish()
    }
}

impl Meter {
    pub(crate) fn new(scope: Scope, provider: Arc<ProviderInner>) -> Self {
        Self { scope, provider }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn counter<T: Number>(&self, name: impl Into<String>) -> InstrumentBuilder<'_, Counter<T>> {
        InstrumentBuilder::new(self, name.into())
    }

    pub fn up_down_counter<T: Number>(
        &self,
        name: impl Into<String>,
    ) -> InstrumentBuilder<'_, UpDownCounter<T>> {
        InstrumentBuilder::new(self, name.into())
    }

    pub fn histogram<T: Number>(&self, name: impl Into<String>) -> InstrumentBuilder<'_, Histogram<T>> {
        InstrumentBuilder::new(self, name.into())
    }

    pub fn observable_counter<T: Number>(
        &self,
        name: impl Into<String>,
    ) -> InstrumentBuilder<'_, ObservableCounter<T>> {
        InstrumentBuilder::new(self, name.into())
    }

    pub fn observable_up_down_counter<T: Number>(
        &self,
        name: impl Into<String>,
    ) -> InstrumentBuilder<'_, ObservableUpDownCounter<T>> {
        InstrumentBuilder::new(self, name.into())
    }

    pub fn observable_gauge<T: Number>(
        &self,
        name: impl Into<String>,
    ) -> InstrumentBuilder<'_, ObservableGauge<T>> {
        InstrumentBuilder::new(self, name.into())
    }

    /// Register an observer for one or more observable instruments.
    pub fn register_callback(
        &self,
        observer: impl Observer,
        instruments: &[&dyn AsObservable],
    ) -> Result<Registration> {
        self.provider.callbacks.register(Arc::new(observer), instruments)
    }
}

/// Instrument options. Finish with `build()`.
pub struct InstrumentBuilder<'a, I> {
    meter: &'a Meter,
    name: String,
    description: String,
    unit: String,
    boundaries: Option<Vec<f64>>,
    _instrument: PhantomData<I>,
}

impl<'a, I> InstrumentBuilder<'a, I> {
    fn new(meter: &'a Meter, name: String) -> Self {
        Self {
            meter,
            name,
            description: String::new(),
            unit: String::new(),
            boundaries: None,
            _instrument: PhantomData,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    fn descriptor(
        self,
        kind: InstrumentKind,
        number: NumberKind,
    ) -> Result<(&'a Meter, InstrumentDescriptor)> {
        validate_name(&self.name)?;
        if let Some(bounds) = &self.boundaries {
            validate_boundaries(bounds)?;
        }
        Ok((
            self.meter,
            InstrumentDescriptor {
                scope: self.meter.scope.clone(),
                name: self.name,
                description: self.description,
                unit: self.unit,
                kind,
                number,
                boundaries: self.boundaries,
            },
        ))
    }

    fn build_sync<T: Number, H>(
        self,
        kind: InstrumentKind,
        wrap: impl FnOnce(Arc<SyncInstrument<T>>) -> H,
    ) -> Result<H>
    where
        H: Clone + Send + Sync + 'static,
    {
        let (meter, desc) = self.descriptor(kind, T::KIND)?;
        let provider = &meter.provider;
        provider.registry.get_or_create(desc, |desc| {
            let stream = provider.views.resolve(desc);
            let measures = provider
                .pipelines
                .iter()
                .map(|p| p.add_sync::<T>(desc, Arc::clone(&stream)))
                .collect();
            tracing::debug!(instrument = %desc.id(), kind = %kind, stream = %stream.name, "instrument created");
            wrap(Arc::new(SyncInstrument {
                id: desc.id(),
                measures,
            }))
        })
    }

    fn build_observable<T: Number, H>(
        self,
        kind: InstrumentKind,
        wrap: impl FnOnce(ObservableHandle) -> H,
    ) -> Result<H>
    where
        H: Clone + Send + Sync + 'static,
    {
        let (meter, desc) = self.descriptor(kind, T::KIND)?;
        let provider = &meter.provider;
        provider.registry.get_or_create(desc, |desc| {
            let stream = provider.views.resolve(desc);
            let id = Arc::new(desc.id());
            for p in &provider.pipelines {
                p.add_observable(desc, Arc::clone(&stream), Arc::clone(&id));
            }
            tracing::debug!(instrument = %id, kind = %kind, stream = %stream.name, "instrument created");
            wrap(ObservableHandle {
                provider: provider.id,
                id,
                kind,
            })
        })
    }
}

impl<T: Number> InstrumentBuilder<'_, Counter<T>> {
    pub fn build(self) -> Result<Counter<T>> {
        self.build_sync(InstrumentKind::Counter, |inner| Counter { inner })
    }
}

impl<T: Number> InstrumentBuilder<'_, UpDownCounter<T>> {
    pub fn build(self) -> Result<UpDownCounter<T>> {
        self.build_sync(InstrumentKind::UpDownCounter, |inner| UpDownCounter { inner })
    }
}

impl<T: Number> InstrumentBuilder<'_, Histogram<T>> {
    /// Advisory bucket boundaries; a matching view takes precedence.
    pub fn with_boundaries(mut self, boundaries: Vec<f64>) -> Self {
        self.boundaries = Some(boundaries);
        self
    }

    pub fn build(self) -> Result<Histogram<T>> {
        self.build_sync(InstrumentKind::Histogram, |inner| Histogram { inner })
    }
}

impl<T: Number> InstrumentBuilder<'_, ObservableCounter<T>> {
    pub fn build(self) -> Result<ObservableCounter<T>> {
        self.build_observable::<T, _>(InstrumentKind::ObservableCounter, |handle| {
            ObservableCounter {
                handle,
                _value: PhantomData,
            }
        })
    }
}

impl<T: Number> InstrumentBuilder<'_, ObservableUpDownCounter<T>> {
    pub fn build(self) -> Result<ObservableUpDownCounter<T>> {
        self.build_observable::<T, _>(InstrumentKind::ObservableUpDownCounter, |handle| {
            ObservableUpDownCounter {
                handle,
                _value: PhantomData,
            }
        })
    }
}

impl<T: Number> InstrumentBuilder<'_, ObservableGauge<T>> {
    pub fn build(self) -> Result<ObservableGauge<T>> {
        self.build_observable::<T, _>(InstrumentKind::ObservableGauge, |handle| ObservableGauge {
            handle,
            _value: PhantomData,
        })
    }
}
