//! RetryManager (C4): per-task retry counters and backoff policy.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Persisted retry state for one task; opaque to the session beyond what
/// `RetryManager` needs to restore it (§3: `TaskRetries`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryState {
    pub attempt: u32,
}

/// Grants or denies another attempt for a task, up to a fixed budget.
pub struct RetryManager {
    max_attempts: u32,
    states: Mutex<HashMap<String, RetryState>>,
}

impl RetryManager {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Restore from a previously persisted snapshot (e.g. after a step
    /// restart that preserves attempt counts).
    pub fn from_snapshot(max_attempts: u32, snapshot: HashMap<String, RetryState>) -> Self {
        Self {
            max_attempts,
            states: Mutex::new(snapshot),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, RetryState>> {
        self.states.lock().expect("retry manager mutex poisoned")
    }

    /// Records an attempt and returns whether another retry is granted.
    pub fn grant_retry(&self, task_id: &str) -> bool {
        let mut states = self.lock();
        let state = states.entry(task_id.to_string()).or_default();
        state.attempt += 1;
        state.attempt < self.max_attempts
    }

    pub fn attempts(&self, task_id: &str) -> u32 {
        self.lock().get(task_id).map(|s| s.attempt).unwrap_or(0)
    }

    pub fn reset(&self, task_id: &str) {
        self.lock().remove(task_id);
    }

    /// Opaque snapshot the session persists so a restart preserves
    /// attempt counts.
    pub fn get_all_states(&self) -> HashMap<String, RetryState> {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_retry_within_budget() {
        let manager = RetryManager::new(3);
        assert!(manager.grant_retry("t1")); // attempt 1 < 3
        assert!(manager.grant_retry("t1")); // attempt 2 < 3
        assert!(!manager.grant_retry("t1")); // attempt 3, not < 3
        assert_eq!(manager.attempts("t1"), 3);
    }

    #[test]
    fn test_reset_clears_entry() {
        let manager = RetryManager::new(2);
        manager.grant_retry("t1");
        manager.reset("t1");
        assert_eq!(manager.attempts("t1"), 0);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let manager = RetryManager::new(5);
        manager.grant_retry("t1");
        manager.grant_retry("t1");
        let snapshot = manager.get_all_states();
        let restored = RetryManager::from_snapshot(5, snapshot);
        assert_eq!(restored.attempts("t1"), 2);
    }

    #[test]
    fn test_zero_budget_never_grants() {
        let manager = RetryManager::new(0);
        assert!(!manager.grant_retry("t1"));
    }
}
