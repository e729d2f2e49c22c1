//! ExecutionOrchestrator: subset of C6 covering task admission and
//! completion handling within the current group (§4.3). Session fields
//! (`running_tasks`, `task_to_instance`) are authoritative; this struct
//! caches the same mapping only so the step resolver has a fallback
//! when the session hasn't observed an admission yet.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::plan::{Group, Plan};

#[derive(Default)]
pub struct ExecutionOrchestrator {
    running_task_instances: Mutex<HashMap<String, String>>,
}

impl ExecutionOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_running(&self, task_id: impl Into<String>, instance_id: impl Into<String>) {
        self.running_task_instances
            .lock()
            .expect("execution orchestrator mutex poisoned")
            .insert(task_id.into(), instance_id.into());
    }

    pub fn remove_running(&self, task_id: &str) {
        self.running_task_instances
            .lock()
            .expect("execution orchestrator mutex poisoned")
            .remove(task_id);
    }

    pub fn running_task_instances(&self) -> HashMap<String, String> {
        self.running_task_instances
            .lock()
            .expect("execution orchestrator mutex poisoned")
            .clone()
    }

    pub fn reset(&self) {
        self.running_task_instances
            .lock()
            .expect("execution orchestrator mutex poisoned")
            .clear();
    }
}

/// Tasks in `group` whose dependencies are all in `completed` and that
/// are not already running, completed, or failed (§4.3 admission).
/// Preserves the group's plan order.
pub fn ready_tasks<'a>(
    group: &'a Group,
    completed: &[String],
    failed: &[String],
    running: &HashMap<String, String>,
) -> Vec<&'a crate::plan::Task> {
    group
        .tasks
        .iter()
        .filter(|task| {
            let already_handled = running.contains_key(&task.id)
                || completed.iter().any(|c| c == &task.id)
                || failed.iter().any(|f| f == &task.id);
            if already_handled {
                return false;
            }
            task.dependencies
                .iter()
                .all(|dep| completed.iter().any(|c| c == dep))
        })
        .collect()
}

/// The base branch a group's tasks should be checked out from: `main`
/// for group 0, otherwise the previous group's consolidated branch.
pub fn base_branch_for_group(
    plan: &Plan,
    group: usize,
    consolidated_branches: &HashMap<usize, String>,
    main_branch: &str,
) -> Option<String> {
    if group == 0 {
        return Some(main_branch.to_string());
    }
    if group >= plan.groups.len() {
        return None;
    }
    consolidated_branches.get(&(group - 1)).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Task;

    fn task(id: &str, deps: &[&str]) -> Task {
        Task {
            id: id.to_string(),
            title: id.to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn test_ready_tasks_respects_dependencies() {
        let group = Group {
            tasks: vec![task("t0", &[]), task("t1", &["t0"])],
        };
        let completed = vec![];
        let failed = vec![];
        let running = HashMap::new();
        let ready = ready_tasks(&group, &completed, &failed, &running);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].id, "t0");
    }

    #[test]
    fn test_ready_tasks_excludes_running_and_completed() {
        let group = Group {
            tasks: vec![task("t0", &[]), task("t1", &[])],
        };
        let completed = vec!["t0".to_string()];
        let failed = vec![];
        let mut running = HashMap::new();
        running.insert("t1".to_string(), "inst-1".to_string());
        let ready = ready_tasks(&group, &completed, &failed, &running);
        assert!(ready.is_empty());
    }

    #[test]
    fn test_base_branch_for_group_zero_is_main() {
        let plan = Plan {
            title: "p".to_string(),
            groups: vec![Group { tasks: vec![] }],
        };
        let branches = HashMap::new();
        assert_eq!(base_branch_for_group(&plan, 0, &branches, "main"), Some("main".to_string()));
    }

    #[test]
    fn test_base_branch_for_later_group_uses_consolidated() {
        let plan = Plan {
            title: "p".to_string(),
            groups: vec![Group { tasks: vec![] }, Group { tasks: vec![] }],
        };
        let mut branches = HashMap::new();
        branches.insert(0, "flockwork/group-0".to_string());
        assert_eq!(
            base_branch_for_group(&plan, 1, &branches, "main"),
            Some("flockwork/group-0".to_string())
        );
    }
}
