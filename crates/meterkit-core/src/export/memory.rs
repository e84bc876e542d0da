use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::sync::lock;
use crate::data::ResourceMetrics;
use crate::error::{MeterError, Result};

use super::Exporter;

/// Keeps every exported snapshot in memory. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExporter {
    finished: Arc<Mutex<Vec<ResourceMetrics>>>,
    shut_down: Arc<AtomicBool>,
}

impl InMemoryExporter {
    pub fn finished_metrics(&self) -> Vec<ResourceMetrics> {
        lock(&self.finished).clone()
    }

    pub fn reset(&self) {
        lock(&self.finished).clear();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Exporter for InMemoryExporter {
    async fn export(&self, metrics: ResourceMetrics) -> Result<()> {
        if self.is_shut_down() {
            return Err(MeterError::Closed);
        }
        lock(&self.finished).push(metrics);
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.shut_down.store(true, Ordering::Release);
        Ok(())
    }
}
