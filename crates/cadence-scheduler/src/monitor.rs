//! Per-pipeline trigger serialization.

use cadence_core::PipelineName;
use std::collections::HashSet;
use tokio::sync::Mutex;

/// Guard preventing two concurrent scheduling attempts for the same
/// pipeline.
///
/// The flag is set at the start of an attempt and must be cleared on every
/// exit path; the producer owns that guarantee. An injected component, never
/// a global.
pub struct TriggerMonitor {
    triggered: Mutex<HashSet<PipelineName>>,
}

impl TriggerMonitor {
    pub fn new() -> Self {
        Self {
            triggered: Mutex::new(HashSet::new()),
        }
    }

    /// Atomically set the flag if unset. Returns false when the pipeline is
    /// already triggered; the caller must treat that as a conflict, not
    /// retry.
    pub async fn mark_as_already_triggered(&self, pipeline: &PipelineName) -> bool {
        self.triggered.lock().await.insert(pipeline.clone())
    }

    /// Clear the flag unconditionally.
    pub async fn mark_as_can_be_triggered(&self, pipeline: &PipelineName) {
        self.triggered.lock().await.remove(pipeline);
    }

    pub async fn is_already_triggered(&self, pipeline: &PipelineName) -> bool {
        self.triggered.lock().await.contains(pipeline)
    }
}

impl Default for TriggerMonitor {
    fn default() -> Self {
        Self::new()
    }
}
