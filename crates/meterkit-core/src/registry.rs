//! Instrument identity index.
//!
//! Append-only. Lookups take the read lock; the write lock is held only while
//! a new instrument (and its per-pipeline aggregators) is being created.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{MeterError, Result};
use crate::instrument::{InstrumentDescriptor, InstrumentId};
use crate::sync::{read, write};

struct Registered {
    desc: InstrumentDescriptor,
    handle: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub(crate) struct InstrumentRegistry {
    entries: RwLock<HashMap<InstrumentId, Registered>>,
}

impl InstrumentRegistry {
    /// Return the existing handle for an identical definition, create one for
    /// a new identity, or fail on an incompatible redefinition.
    pub(crate) fn get_or_create<H>(
        &self,
        desc: InstrumentDescriptor,
        create: impl FnOnce(&InstrumentDescriptor) -> H,
    ) -> Result<H>
    where
        H: Clone + Send + Sync + 'static,
    {
        let id = desc.id();
        {
            let entries = read(&self.entries);
            if let Some(existing) = entries.get(&id) {
                return reuse(existing, &desc);
            }
        }

        let mut entries = write(&self.entries);
        // another initializer may have won the race
        if let Some(existing) = entries.get(&id) {
            return reuse(existing, &desc);
        }

        let handle = create(&desc);
        entries.insert(
            id,
            Registered {
                desc,
                handle: Arc::new(handle.clone()),
            },
        );
        Ok(handle)
    }

    pub(crate) fn len(&self) -> usize {
        read(&self.entries).len()
    }
}

fn reuse<H: Clone + 'static>(existing: &Registered, desc: &InstrumentDescriptor) -> Result<H> {
    if let Some(reason) = existing.desc.incompatibility(desc) {
        return Err(MeterError::DuplicateDefinition {
            scope: desc.scope.name.clone(),
            name: desc.name.clone(),
            reason,
        });
    }
    existing
        .handle
        .downcast_ref::<H>()
        .cloned()
        .ok_or_else(|| MeterError::Internal(format!("handle type mismatch for {}", desc.id())))
}
