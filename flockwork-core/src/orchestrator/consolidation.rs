//! ConsolidationOrchestrator: subset of C6 covering group and
//! whole-plan consolidation (§4.5). Merges branches via `Checkout`;
//! caches instance IDs as a step-resolution fallback.

use std::sync::Mutex;

#[derive(Default)]
pub struct ConsolidationOrchestrator {
    consolidation_instance_id: Mutex<Option<String>>,
    group_consolidator_instance_ids: Mutex<Vec<Option<String>>>,
}

impl ConsolidationOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_consolidation_instance(&self, id: impl Into<String>) {
        *self
            .consolidation_instance_id
            .lock()
            .expect("consolidation orchestrator mutex poisoned") = Some(id.into());
    }

    pub fn consolidation_instance(&self) -> Option<String> {
        self.consolidation_instance_id
            .lock()
            .expect("consolidation orchestrator mutex poisoned")
            .clone()
    }

    pub fn record_group_consolidator_instance(&self, group: usize, id: impl Into<String>) {
        let mut ids = self
            .group_consolidator_instance_ids
            .lock()
            .expect("consolidation orchestrator mutex poisoned");
        if ids.len() <= group {
            ids.resize(group + 1, None);
        }
        ids[group] = Some(id.into());
    }

    pub fn group_consolidator_instance(&self, group: usize) -> Option<String> {
        self.group_consolidator_instance_ids
            .lock()
            .expect("consolidation orchestrator mutex poisoned")
            .get(group)
            .cloned()
            .flatten()
    }

    pub fn group_consolidator_instances(&self) -> Vec<Option<String>> {
        self.group_consolidator_instance_ids
            .lock()
            .expect("consolidation orchestrator mutex poisoned")
            .clone()
    }

    /// Clears conflict/instance-tracking state for `group`, preserving
    /// already-computed consolidated branches (those live on the
    /// session, not here) so a step restart does not redo finished work.
    pub fn clear_state_for_restart(&self, group: usize) {
        let mut ids = self
            .group_consolidator_instance_ids
            .lock()
            .expect("consolidation orchestrator mutex poisoned");
        if let Some(slot) = ids.get_mut(group) {
            *slot = None;
        }
    }

    pub fn reset(&self) {
        *self
            .consolidation_instance_id
            .lock()
            .expect("consolidation orchestrator mutex poisoned") = None;
        self.group_consolidator_instance_ids
            .lock()
            .expect("consolidation orchestrator mutex poisoned")
            .clear();
    }
}
