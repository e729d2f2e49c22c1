//! SynthesisOrchestrator: subset of C6 covering the synthesis/revision
//! sub-phase (§4.4). Caches instance IDs as a step-resolution fallback.

use std::collections::HashMap;
use std::sync::Mutex;

/// An issue report a synthesis worker writes to its completion sentinel.
#[derive(Debug, Clone)]
pub struct SynthesisReport {
    pub completion_notes: String,
    pub issues: Vec<crate::session::Issue>,
}

#[derive(Default)]
pub struct SynthesisOrchestrator {
    synthesis_instance_id: Mutex<Option<String>>,
    running_revision_instances: Mutex<HashMap<String, String>>,
}

impl SynthesisOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_synthesis_instance(&self, id: impl Into<String>) {
        *self
            .synthesis_instance_id
            .lock()
            .expect("synthesis orchestrator mutex poisoned") = Some(id.into());
    }

    pub fn synthesis_instance(&self) -> Option<String> {
        self.synthesis_instance_id
            .lock()
            .expect("synthesis orchestrator mutex poisoned")
            .clone()
    }

    pub fn record_revision_instance(&self, task_id: impl Into<String>, instance_id: impl Into<String>) {
        self.running_revision_instances
            .lock()
            .expect("synthesis orchestrator mutex poisoned")
            .insert(task_id.into(), instance_id.into());
    }

    pub fn remove_revision_instance(&self, task_id: &str) {
        self.running_revision_instances
            .lock()
            .expect("synthesis orchestrator mutex poisoned")
            .remove(task_id);
    }

    pub fn running_revision_instances(&self) -> HashMap<String, String> {
        self.running_revision_instances
            .lock()
            .expect("synthesis orchestrator mutex poisoned")
            .clone()
    }

    pub fn reset(&self) {
        *self
            .synthesis_instance_id
            .lock()
            .expect("synthesis orchestrator mutex poisoned") = None;
        self.running_revision_instances
            .lock()
            .expect("synthesis orchestrator mutex poisoned")
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_instance_roundtrip() {
        let orch = SynthesisOrchestrator::new();
        orch.record_revision_instance("t0", "inst-1");
        assert_eq!(orch.running_revision_instances().get("t0").unwrap(), "inst-1");
        orch.remove_revision_instance("t0");
        assert!(orch.running_revision_instances().is_empty());
    }

    #[test]
    fn test_reset_clears_synthesis_instance() {
        let orch = SynthesisOrchestrator::new();
        orch.record_synthesis_instance("inst-1");
        orch.reset();
        assert!(orch.synthesis_instance().is_none());
    }
}
