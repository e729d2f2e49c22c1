//! StepResolver (C8): maps a worker instance ID back to the work item it
//! represents, consulting session state first and each phase
//! orchestrator's own instance cache as a fallback (§4.9).

use std::collections::HashMap;

use crate::session::UltraPlanSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepType {
    Planning,
    PlanManager,
    Task,
    Synthesis,
    Revision,
    Consolidation,
    GroupConsolidator,
}

#[derive(Debug, Clone)]
pub struct StepInfo {
    pub step_type: StepType,
    pub instance_id: String,
    pub task_id: Option<String>,
    pub group_index: Option<usize>,
    pub label: String,
}

/// Fallback instance caches from each phase orchestrator, gathered at
/// resolution time so this struct stays free of direct dependencies on
/// the orchestrator types themselves.
#[derive(Default)]
pub struct ResolverFallbacks {
    pub planning_coordinator_instance: Option<String>,
    pub plan_coordinator_instances: Vec<String>,
    pub execution_running_instances: HashMap<String, String>,
    pub group_consolidator_instances: Vec<Option<String>>,
    pub running_revision_instances: HashMap<String, String>,
}

/// Resolve an instance ID to the `StepInfo` it represents, per the order
/// in §4.9: planning coordinator → multi-pass plan coordinators → plan
/// manager → task (TaskToInstance, then execution running-tasks map) →
/// group consolidator → synthesis → running revision tasks →
/// consolidation.
pub fn resolve_step(session: &UltraPlanSession, fallbacks: &ResolverFallbacks, instance_id: &str) -> Option<StepInfo> {
    if session.coordinator_id.as_deref() == Some(instance_id)
        || fallbacks.planning_coordinator_instance.as_deref() == Some(instance_id)
    {
        return Some(StepInfo {
            step_type: StepType::Planning,
            instance_id: instance_id.to_string(),
            task_id: None,
            group_index: None,
            label: "planning".to_string(),
        });
    }

    if session.plan_coordinator_ids.iter().any(|id| id == instance_id)
        || fallbacks.plan_coordinator_instances.iter().any(|id| id == instance_id)
    {
        return Some(StepInfo {
            step_type: StepType::Planning,
            instance_id: instance_id.to_string(),
            task_id: None,
            group_index: None,
            label: "plan coordinator".to_string(),
        });
    }

    if session.plan_manager_id.as_deref() == Some(instance_id) {
        return Some(StepInfo {
            step_type: StepType::PlanManager,
            instance_id: instance_id.to_string(),
            task_id: None,
            group_index: None,
            label: "plan manager".to_string(),
        });
    }

    if let Some(task_id) = find_by_value(&session.task_to_instance, instance_id)
        .or_else(|| find_by_value(&session.running_tasks, instance_id))
        .or_else(|| find_by_value(&fallbacks.execution_running_instances, instance_id))
    {
        let group_index = session.plan.as_ref().and_then(|p| p.group_of(&task_id));
        return Some(StepInfo {
            step_type: StepType::Task,
            instance_id: instance_id.to_string(),
            task_id: Some(task_id.clone()),
            group_index,
            label: format!("task {}", task_id),
        });
    }

    if let Some(group_index) = find_group_consolidator(&session.group_consolidator_ids, instance_id)
        .or_else(|| find_group_consolidator(&fallbacks.group_consolidator_instances, instance_id))
    {
        return Some(StepInfo {
            step_type: StepType::GroupConsolidator,
            instance_id: instance_id.to_string(),
            task_id: None,
            group_index: Some(group_index),
            label: format!("group consolidator {}", group_index),
        });
    }

    if session.synthesis_id.as_deref() == Some(instance_id) {
        return Some(StepInfo {
            step_type: StepType::Synthesis,
            instance_id: instance_id.to_string(),
            task_id: None,
            group_index: None,
            label: "synthesis".to_string(),
        });
    }

    if let Some(revision) = &session.revision {
        if let Some(task_id) = find_by_value(&revision.running_revision_tasks, instance_id)
            .or_else(|| find_by_value(&fallbacks.running_revision_instances, instance_id))
        {
            return Some(StepInfo {
                step_type: StepType::Revision,
                instance_id: instance_id.to_string(),
                task_id: Some(task_id.clone()),
                group_index: None,
                label: format!("revision {}", task_id),
            });
        }
    }

    if session.consolidation_id.as_deref() == Some(instance_id) {
        return Some(StepInfo {
            step_type: StepType::Consolidation,
            instance_id: instance_id.to_string(),
            task_id: None,
            group_index: None,
            label: "consolidation".to_string(),
        });
    }

    None
}

fn find_by_value(map: &HashMap<String, String>, instance_id: &str) -> Option<String> {
    map.iter()
        .find(|(_, v)| v.as_str() == instance_id)
        .map(|(k, _)| k.clone())
}

fn find_group_consolidator(ids: &[Option<String>], instance_id: &str) -> Option<usize> {
    ids.iter().position(|id| id.as_deref() == Some(instance_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;

    #[test]
    fn test_resolve_planning_from_session() {
        let mut session = UltraPlanSession::new("s1", "obj", OrchestratorConfig::default());
        session.coordinator_id = Some("inst-1".to_string());
        let fallbacks = ResolverFallbacks::default();
        let step = resolve_step(&session, &fallbacks, "inst-1").unwrap();
        assert_eq!(step.step_type, StepType::Planning);
    }

    #[test]
    fn test_resolve_task_via_task_to_instance() {
        let mut session = UltraPlanSession::new("s1", "obj", OrchestratorConfig::default());
        session.task_to_instance.insert("t1".to_string(), "inst-2".to_string());
        let fallbacks = ResolverFallbacks::default();
        let step = resolve_step(&session, &fallbacks, "inst-2").unwrap();
        assert_eq!(step.step_type, StepType::Task);
        assert_eq!(step.task_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_resolve_task_falls_back_to_execution_cache() {
        let session = UltraPlanSession::new("s1", "obj", OrchestratorConfig::default());
        let mut fallbacks = ResolverFallbacks::default();
        fallbacks.execution_running_instances.insert("t9".to_string(), "inst-9".to_string());
        let step = resolve_step(&session, &fallbacks, "inst-9").unwrap();
        assert_eq!(step.task_id.as_deref(), Some("t9"));
    }

    #[test]
    fn test_resolve_unknown_instance_is_none() {
        let session = UltraPlanSession::new("s1", "obj", OrchestratorConfig::default());
        let fallbacks = ResolverFallbacks::default();
        assert!(resolve_step(&session, &fallbacks, "nope").is_none());
    }
}
