//! Console exporter.

use std::io::Write;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use meterkit_core::error::{MeterError, Result};
use meterkit_core::{Exporter, ResourceMetrics};

/// Writes each snapshot as JSON indented with two spaces.
#[derive(Clone)]
pub struct StdoutExporter {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
    timestamps: bool,
}

impl std::fmt::Debug for StdoutExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdoutExporter")
            .field("timestamps", &self.timestamps)
            .finish_non_exhaustive()
    }
}

impl StdoutExporter {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(out))),
            timestamps: true,
        }
    }

    /// Zero all timestamps so repeated output is diffable.
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    pub fn write(&self, mut metrics: ResourceMetrics) -> Result<()> {
        if !self.timestamps {
            metrics.strip_timestamps();
        }
        let mut out = self
            .out
            .lock()
            .map_err(|_| MeterError::Internal("stdout exporter lock poisoned".into()))?;
        serde_json::to_writer_pretty(&mut *out, &metrics)
            .map_err(|e| MeterError::Export(format!("encode snapshot: {e}")))?;
        writeln!(out).map_err(|e| MeterError::Export(format!("write snapshot: {e}")))?;
        out.flush()
            .map_err(|e| MeterError::Export(format!("flush snapshot: {e}")))
    }
}

#[async_trait]
impl Exporter for StdoutExporter {
    async fn export(&self, metrics: ResourceMetrics) -> Result<()> {
        self.write(metrics)
    }
}
