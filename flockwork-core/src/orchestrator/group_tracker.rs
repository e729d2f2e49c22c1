//! GroupTracker (C3): per-group task counts and advancement.
//!
//! Holds its own mutex, independent of `SessionStore` (§5 lock order:
//! SessionStore before GroupTracker). Accessors never reveal the
//! internal maps by reference.

use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct GroupRecord {
    total: usize,
    completed: HashSet<String>,
    failed: HashSet<String>,
}

/// Tracks completion state for every group of a plan.
pub struct GroupTracker {
    groups: Mutex<Vec<GroupRecord>>,
    current_group: Mutex<usize>,
}

impl GroupTracker {
    /// `group_sizes[i]` is the number of tasks in group `i`.
    pub fn new(group_sizes: &[usize]) -> Self {
        let groups = group_sizes
            .iter()
            .map(|&total| GroupRecord {
                total,
                completed: HashSet::new(),
                failed: HashSet::new(),
            })
            .collect();
        Self {
            groups: Mutex::new(groups),
            current_group: Mutex::new(0),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<GroupRecord>> {
        self.groups.lock().expect("group tracker mutex poisoned")
    }

    pub fn record_completed(&self, group: usize, task_id: &str) {
        let mut groups = self.lock();
        if let Some(record) = groups.get_mut(group) {
            record.failed.remove(task_id);
            record.completed.insert(task_id.to_string());
        }
    }

    pub fn record_failed(&self, group: usize, task_id: &str) {
        let mut groups = self.lock();
        if let Some(record) = groups.get_mut(group) {
            record.completed.remove(task_id);
            record.failed.insert(task_id.to_string());
        }
    }

    /// Removes a task from both the completed and failed sets, returning
    /// it to "not yet attempted" so it is re-admitted (used when an
    /// operator chooses to retry a partial-failure group, §4.3).
    pub fn clear_task(&self, group: usize, task_id: &str) {
        let mut groups = self.lock();
        if let Some(record) = groups.get_mut(group) {
            record.completed.remove(task_id);
            record.failed.remove(task_id);
        }
    }

    /// `completed + failed >= total && total > 0`.
    pub fn is_group_complete(&self, group: usize) -> bool {
        let groups = self.lock();
        groups
            .get(group)
            .map(|r| r.total > 0 && r.completed.len() + r.failed.len() >= r.total)
            .unwrap_or(false)
    }

    /// `completed.len() > 0 && failed.len() > 0`.
    pub fn has_partial_failure(&self, group: usize) -> bool {
        let groups = self.lock();
        groups
            .get(group)
            .map(|r| !r.completed.is_empty() && !r.failed.is_empty())
            .unwrap_or(false)
    }

    pub fn completed_count(&self, group: usize) -> usize {
        self.lock().get(group).map(|r| r.completed.len()).unwrap_or(0)
    }

    pub fn failed_count(&self, group: usize) -> usize {
        self.lock().get(group).map(|r| r.failed.len()).unwrap_or(0)
    }

    pub fn group_count(&self) -> usize {
        self.lock().len()
    }

    pub fn current_group(&self) -> usize {
        *self.current_group.lock().expect("current group mutex poisoned")
    }

    /// Sets `current_group = g + 1`, returning the new value.
    pub fn advance_group(&self, g: usize) -> usize {
        let mut current = self.current_group.lock().expect("current group mutex poisoned");
        *current = g + 1;
        *current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_complete_requires_nonzero_total() {
        let tracker = GroupTracker::new(&[0]);
        assert!(!tracker.is_group_complete(0));
    }

    #[test]
    fn test_group_complete_all_success() {
        let tracker = GroupTracker::new(&[2]);
        tracker.record_completed(0, "t1");
        assert!(!tracker.is_group_complete(0));
        tracker.record_completed(0, "t2");
        assert!(tracker.is_group_complete(0));
        assert!(!tracker.has_partial_failure(0));
    }

    #[test]
    fn test_partial_failure_detection() {
        let tracker = GroupTracker::new(&[2]);
        tracker.record_completed(0, "t1");
        tracker.record_failed(0, "t2");
        assert!(tracker.is_group_complete(0));
        assert!(tracker.has_partial_failure(0));
    }

    #[test]
    fn test_advance_group() {
        let tracker = GroupTracker::new(&[1, 1]);
        assert_eq!(tracker.advance_group(0), 1);
        assert_eq!(tracker.current_group(), 1);
    }

    #[test]
    fn test_reassigning_task_moves_between_sets() {
        let tracker = GroupTracker::new(&[1]);
        tracker.record_failed(0, "t1");
        assert_eq!(tracker.failed_count(0), 1);
        tracker.record_completed(0, "t1");
        assert_eq!(tracker.failed_count(0), 0);
        assert_eq!(tracker.completed_count(0), 1);
    }
}
