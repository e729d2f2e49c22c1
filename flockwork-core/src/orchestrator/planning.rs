//! PlanningOrchestrator: subset of C6 covering plan production.
//!
//! Caches the instance IDs of in-flight planning workers for the step
//! resolver's fallback path (§4.9); the session fields
//! (`coordinator_id`, `plan_coordinator_ids`) remain authoritative.

use std::sync::Mutex;

#[derive(Default)]
pub struct PlanningOrchestrator {
    coordinator_instance_id: Mutex<Option<String>>,
    plan_coordinator_instance_ids: Mutex<Vec<String>>,
}

impl PlanningOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_coordinator_instance(&self, id: impl Into<String>) {
        *self
            .coordinator_instance_id
            .lock()
            .expect("planning orchestrator mutex poisoned") = Some(id.into());
    }

    pub fn record_plan_coordinator_instance(&self, id: impl Into<String>) {
        self.plan_coordinator_instance_ids
            .lock()
            .expect("planning orchestrator mutex poisoned")
            .push(id.into());
    }

    pub fn coordinator_instance(&self) -> Option<String> {
        self.coordinator_instance_id
            .lock()
            .expect("planning orchestrator mutex poisoned")
            .clone()
    }

    pub fn plan_coordinator_instances(&self) -> Vec<String> {
        self.plan_coordinator_instance_ids
            .lock()
            .expect("planning orchestrator mutex poisoned")
            .clone()
    }

    /// Clears cached instance IDs without touching session state (§4.4).
    pub fn reset(&self) {
        *self
            .coordinator_instance_id
            .lock()
            .expect("planning orchestrator mutex poisoned") = None;
        self.plan_coordinator_instance_ids
            .lock()
            .expect("planning orchestrator mutex poisoned")
            .clear();
    }
}
