//! Coordinator (C7): the ultra-plan phase state machine. Composes
//! SessionStore, WorkerPool, Checkout, GroupTracker, RetryManager,
//! Verifier, the phase orchestrators, the event bus, and the step
//! resolver/restarter (§4.2).

use std::collections::HashMap;
use std::sync::Arc;

use crate::plan::Plan;
use crate::session::{GroupDecision, Issue, Phase, SessionStore, UltraPlanSession};
use crate::{Error, Result};

use super::checkout::Checkout;
use super::consolidation::ConsolidationOrchestrator;
use super::events::{Event, EventBus};
use super::execution::{base_branch_for_group, ready_tasks, ExecutionOrchestrator};
use super::group_tracker::GroupTracker;
use super::planning::PlanningOrchestrator;
use super::retry::RetryManager;
use super::step::{resolve_step, ResolverFallbacks, StepInfo, StepType};
use super::synthesis::{SynthesisOrchestrator, SynthesisReport};
use super::verifier::Verifier;
use super::worker_pool::{Completion, WorkerPool, WorkerView};

/// How an operator resolves a group's partial-failure pause (P4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupResolution {
    RetryFailed,
    ProceedWithoutFailed,
    Abort,
}

/// Only these phase edges are legal (§4.2, P3).
fn is_legal_transition(from: Phase, to: Phase) -> bool {
    use Phase::*;
    matches!(
        (from, to),
        (Planning, Executing)
            | (Planning, PlanSelection)
            | (PlanSelection, Executing)
            | (Executing, Synthesis)
            | (Executing, Complete)
            | (Executing, Failed)
            | (Synthesis, Revision)
            | (Synthesis, Consolidating)
            | (Synthesis, Complete)
            | (Revision, Synthesis)
            | (Consolidating, Complete)
            | (Consolidating, Failed)
    ) || to == Failed
}

pub struct Coordinator {
    session: Arc<SessionStore<UltraPlanSession>>,
    worker_pool: Arc<dyn WorkerPool>,
    checkout: Arc<dyn Checkout>,
    group_tracker: std::sync::Mutex<Option<GroupTracker>>,
    retry: RetryManager,
    events: EventBus,
    planning: PlanningOrchestrator,
    synthesis_orch: SynthesisOrchestrator,
    consolidation_orch: ConsolidationOrchestrator,
    execution_orch: ExecutionOrchestrator,
    main_branch: String,
}

impl Coordinator {
    pub fn new(
        session: Arc<SessionStore<UltraPlanSession>>,
        worker_pool: Arc<dyn WorkerPool>,
        checkout: Arc<dyn Checkout>,
        main_branch: impl Into<String>,
    ) -> Self {
        let max_attempts = session.with(|s| s.config.max_task_retries);
        Self {
            session,
            worker_pool,
            checkout,
            group_tracker: std::sync::Mutex::new(None),
            retry: RetryManager::new(max_attempts),
            events: EventBus::new(),
            planning: PlanningOrchestrator::new(),
            synthesis_orch: SynthesisOrchestrator::new(),
            consolidation_orch: ConsolidationOrchestrator::new(),
            execution_orch: ExecutionOrchestrator::new(),
            main_branch: main_branch.into(),
        }
    }

    pub fn session(&self) -> &Arc<SessionStore<UltraPlanSession>> {
        &self.session
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn transition(&self, to: Phase) -> Result<()> {
        let from = self.session.with(|s| s.phase);
        if !is_legal_transition(from, to) {
            return Err(Error::Fatal(format!("illegal phase transition {} -> {}", from, to)));
        }
        let id = self.session.with_mut(|s| {
            s.phase = to;
            s.id.clone()
        });
        self.events.emit(Event::PhaseChanged {
            session_id: id,
            phase: to.to_string(),
        });
        Ok(())
    }

    fn emit_progress(&self, message: impl Into<String>) {
        let (id, completed, total) = self.session.with(|s| (s.id.clone(), s.completed_count(), s.total_tasks()));
        let _ = (completed, total);
        self.events.emit(Event::Progress {
            session_id: id,
            message: message.into(),
        });
    }

    // ---- Planning (§4.4) ----------------------------------------------

    /// Accepts a plan produced externally by a planning worker, validates
    /// it, and moves to Executing (or PlanSelection for multi-pass runs).
    pub fn accept_plan(&self, plan: Plan) -> Result<()> {
        plan.validate()?;
        let group_sizes: Vec<usize> = plan.groups.iter().map(|g| g.tasks.len()).collect();
        *self.group_tracker.lock().expect("group tracker slot poisoned") = Some(GroupTracker::new(&group_sizes));

        let multi_pass = self.session.with(|s| s.config.multi_pass);
        self.session.with_mut(|s| {
            s.plan = Some(plan);
        });

        if multi_pass {
            self.transition(Phase::PlanSelection)?;
        } else {
            self.transition(Phase::Executing)?;
        }
        Ok(())
    }

    /// Only valid during `PlanSelection` (multi-pass): commits to
    /// Executing once the operator has chosen among several candidate
    /// plans.
    pub fn select_plan(&self) -> Result<()> {
        let phase = self.session.with(|s| s.phase);
        if phase != Phase::PlanSelection {
            return Err(Error::InvalidRequest("select_plan called outside PlanSelection".to_string()));
        }
        self.transition(Phase::Executing)
    }

    fn with_group_tracker<R>(&self, f: impl FnOnce(&GroupTracker) -> R) -> Result<R> {
        let guard = self.group_tracker.lock().expect("group tracker slot poisoned");
        guard
            .as_ref()
            .map(f)
            .ok_or_else(|| Error::Fatal("no plan accepted yet".to_string()))
    }

    // ---- Execution (§4.3) ----------------------------------------------

    /// Admits ready tasks from the current group up to `MaxParallel`
    /// (treated as 1 when `MaxParallel <= 0`).
    pub async fn admit_ready_tasks(&self) -> Result<()> {
        let (plan, current_group, completed, failed, running, cap) = self.session.with(|s| {
            (
                s.plan.clone(),
                s.current_group,
                s.completed_tasks.clone(),
                s.failed_tasks.clone(),
                s.running_tasks.clone(),
                s.config.max_parallel,
            )
        });
        let plan = plan.ok_or_else(|| Error::Fatal("no plan accepted yet".to_string()))?;
        let group = plan
            .groups
            .get(current_group)
            .ok_or_else(|| Error::Fatal(format!("current group {} out of range", current_group)))?;

        let cap = if cap <= 0 { 1 } else { cap as usize };
        let mut slots = cap.saturating_sub(running.len());
        if slots == 0 {
            return Ok(());
        }

        let branches = self.session.with(|s| s.group_consolidated_branches.clone());
        let base = base_branch_for_group(&plan, current_group, &branches, &self.main_branch)
            .ok_or_else(|| Error::Fatal("no base branch for current group".to_string()))?;

        let candidates: Vec<String> = ready_tasks(group, &completed, &failed, &running)
            .into_iter()
            .map(|t| t.id.clone())
            .collect();

        for task_id in candidates {
            if slots == 0 {
                break;
            }
            let task = group.tasks.iter().find(|t| t.id == task_id).cloned();
            let Some(task) = task else { continue };

            let view: WorkerView = self.checkout.view_for(&task.id, &base)?;
            let prompt = format!("Implement task {}: {}", task.id, task.title);
            let instance = self.worker_pool.add_instance(&task, &view, &prompt).await?;

            self.execution_orch.record_running(task.id.clone(), instance.id.clone());
            self.session.with_mut(|s| {
                s.running_tasks.insert(task.id.clone(), instance.id.clone());
                s.task_to_instance.insert(task.id.clone(), instance.id.clone());
            });
            slots -= 1;
        }
        Ok(())
    }

    /// Processes one worker completion notice (§4.3 "Completion").
    ///
    /// A completion is successful iff the verifier finds the worker's
    /// completion sentinel AND at least one commit on its branch (§4.6);
    /// `Completion::success` (the worker pool's own exit-status signal)
    /// is a necessary but not sufficient precondition for running that
    /// check at all — a worker that exited non-zero is never verified.
    pub fn handle_completion(&self, completion: Completion) -> Result<()> {
        let Some(task_id) = completion.task_id.clone() else {
            return Ok(());
        };

        let current_group = self.session.with(|s| s.current_group);
        let group_index = self
            .session
            .with(|s| s.plan.as_ref().and_then(|p| p.group_of(&task_id)))
            .unwrap_or(current_group);

        let instance = self.worker_pool.get_instance(&completion.instance_id);
        let base_branch = self.session.with(|s| {
            s.plan
                .as_ref()
                .and_then(|plan| base_branch_for_group(plan, group_index, &s.group_consolidated_branches, &self.main_branch))
        });

        let (success, commit_count) = match (&instance, &base_branch) {
            (Some(inst), Some(base)) if completion.success => {
                let view = WorkerView {
                    path: inst.worktree_path.clone(),
                    branch: inst.branch.clone(),
                    base_branch: base.clone(),
                };
                let outcome = self.checkout.verify(&view);
                (outcome.success, outcome.commit_count as u64)
            }
            _ => (false, 0),
        };

        self.execution_orch.remove_running(&task_id);

        if success {
            self.session.with_mut(|s| {
                s.running_tasks.remove(&task_id);
                s.task_to_instance.remove(&task_id);
                s.completed_tasks.push(task_id.clone());
                s.task_commit_counts.insert(task_id.clone(), commit_count);
            });
            self.with_group_tracker(|gt| gt.record_completed(group_index, &task_id))?;
        } else if completion.needs_retry && self.retry.grant_retry(&task_id) {
            // Clear from TaskToInstance so the next admission cycle
            // re-admits it; it was never moved into RunningTasks'
            // terminal state.
            self.session.with_mut(|s| {
                s.running_tasks.remove(&task_id);
                s.task_to_instance.remove(&task_id);
            });
        } else {
            self.session.with_mut(|s| {
                s.running_tasks.remove(&task_id);
                s.task_to_instance.remove(&task_id);
                s.failed_tasks.push(task_id.clone());
            });
            self.with_group_tracker(|gt| gt.record_failed(group_index, &task_id))?;
        }

        self.emit_progress(format!("task {} finished (success={})", task_id, success));
        self.maybe_advance_group(group_index)
    }

    /// Recovers completions `PollTaskCompletions` surfaces that the
    /// channel missed, de-duplicating against tasks already resolved
    /// (decided open question, §9).
    pub async fn poll_and_reconcile(&self) -> Result<()> {
        let polled = self.worker_pool.poll_task_completions().await;
        for completion in polled {
            let Some(task_id) = &completion.task_id else { continue };
            let already_resolved = self.session.with(|s| {
                s.completed_tasks.iter().any(|t| t == task_id) || s.failed_tasks.iter().any(|t| t == task_id)
            });
            if already_resolved {
                continue;
            }
            self.handle_completion(completion)?;
        }
        Ok(())
    }

    fn maybe_advance_group(&self, group: usize) -> Result<()> {
        let complete = self.with_group_tracker(|gt| gt.is_group_complete(group))?;
        if !complete {
            return Ok(());
        }

        let partial_failure = self.with_group_tracker(|gt| gt.has_partial_failure(group))?;
        if partial_failure {
            self.session.with_mut(|s| {
                s.group_decision = Some(GroupDecision {
                    group_index: group,
                    awaiting_decision: true,
                });
            });
            self.emit_progress(format!("group {} awaiting partial-failure decision", group));
            return Ok(());
        }

        match self.consolidate_group(group) {
            Ok(()) => {
                let next = self.with_group_tracker(|gt| gt.advance_group(group))?;
                self.session.with_mut(|s| s.current_group = next);
                let total_groups = self.session.with(|s| s.group_count());
                if next >= total_groups {
                    self.finish_execution()
                } else {
                    Ok(())
                }
            }
            Err(e) => {
                self.session.with_mut(|s| {
                    s.phase = Phase::Failed;
                    s.error = Some(e.to_string());
                });
                let id = self.session.with(|s| s.id.clone());
                self.events.emit(Event::Complete { session_id: id });
                Err(e)
            }
        }
    }

    /// Resolves a group's partial-failure pause per the operator's
    /// decision (P4: consolidation never runs for this group until this
    /// is called).
    pub fn resolve_group_decision(&self, resolution: GroupResolution) -> Result<()> {
        let group = self
            .session
            .with(|s| s.group_decision.as_ref().map(|d| d.group_index))
            .ok_or_else(|| Error::InvalidRequest("no group decision pending".to_string()))?;

        match resolution {
            GroupResolution::Abort => {
                self.session.with_mut(|s| {
                    s.phase = Phase::Failed;
                    s.group_decision = None;
                    s.error = Some(format!("aborted at group {} per operator decision", group));
                });
                let id = self.session.with(|s| s.id.clone());
                self.events.emit(Event::Complete { session_id: id });
                Ok(())
            }
            GroupResolution::RetryFailed => {
                let failed = self.session.with(|s| s.failed_tasks.clone());
                self.session.with_mut(|s| {
                    s.failed_tasks.retain(|t| !failed.contains(t));
                    s.group_decision = None;
                });
                for task_id in &failed {
                    self.with_group_tracker(|gt| gt.clear_task(group, task_id))?;
                    self.retry.reset(task_id);
                }
                Ok(())
            }
            GroupResolution::ProceedWithoutFailed => {
                self.session.with_mut(|s| s.group_decision = None);
                let next = self.with_group_tracker(|gt| gt.advance_group(group))?;
                self.session.with_mut(|s| s.current_group = next);
                Ok(())
            }
        }
    }

    fn consolidate_group(&self, group: usize) -> Result<()> {
        let (plan, branches, completed) = self.session.with(|s| {
            (
                s.plan.clone(),
                s.group_consolidated_branches.clone(),
                s.completed_tasks.clone(),
            )
        });
        let plan = plan.ok_or_else(|| Error::Fatal("no plan accepted yet".to_string()))?;
        let base = base_branch_for_group(&plan, group, &branches, &self.main_branch)
            .ok_or_else(|| Error::Fatal("no base branch to consolidate from".to_string()))?;

        let group_task_ids: Vec<String> = plan.groups[group]
            .tasks
            .iter()
            .map(|t| t.id.clone())
            .filter(|id| completed.contains(id))
            .collect();
        let branch_names: Vec<String> = group_task_ids.iter().map(|id| format!("flockwork/task-{}", id)).collect();
        let into_branch = format!("flockwork/group-{}", group);

        let outcome = self.checkout.merge(&base, &into_branch, &branch_names, group)?;
        self.session.with_mut(|s| {
            s.group_consolidated_branches.insert(group, into_branch.clone());
        });
        self.consolidation_orch.record_group_consolidator_instance(group, outcome.commit.clone());
        Ok(())
    }

    fn finish_execution(&self) -> Result<()> {
        let (any_failed, no_synthesis) = self.session.with(|s| (!s.failed_tasks.is_empty(), s.config.no_synthesis));
        if any_failed {
            self.session.with_mut(|s| s.phase = Phase::Failed);
            let id = self.session.with(|s| s.id.clone());
            self.events.emit(Event::Complete { session_id: id });
            return Ok(());
        }
        if no_synthesis {
            self.transition(Phase::Complete)?;
            let id = self.session.with(|s| s.id.clone());
            self.events.emit(Event::Complete { session_id: id });
            return Ok(());
        }
        self.transition(Phase::Synthesis)
    }

    // ---- Synthesis & Revision (§4.4) -----------------------------------

    /// Processes a synthesis worker's completion sentinel (P8: revision
    /// is triggered iff an issue has critical/major severity).
    pub fn process_synthesis_report(&self, report: SynthesisReport) -> Result<()> {
        self.session.with_mut(|s| {
            s.synthesis_completion = Some(report.completion_notes.clone());
        });

        let needs_revision = report.issues.iter().any(|i| i.severity.triggers_revision());
        if needs_revision {
            self.start_revision(report.issues)
        } else {
            let group_count = self.session.with(|s| s.group_count());
            if group_count == 0 {
                self.transition(Phase::Complete)
            } else {
                self.transition(Phase::Consolidating)?;
                self.run_consolidation()
            }
        }
    }

    fn start_revision(&self, issues: Vec<Issue>) -> Result<()> {
        use crate::session::RevisionState;
        let mut revision = RevisionState {
            issues,
            ..Default::default()
        };
        revision.reset_progress();
        self.session.with_mut(|s| s.revision = Some(revision));
        self.transition(Phase::Revision)
    }

    /// Launches one worker per task in `TasksToRevise`.
    pub async fn run_revision_tasks(&self) -> Result<()> {
        let tasks_to_revise = self
            .session
            .with(|s| s.revision.as_ref().map(|r| r.tasks_to_revise.clone()))
            .unwrap_or_default();

        let plan = self.session.with(|s| s.plan.clone()).ok_or_else(|| Error::Fatal("no plan accepted yet".to_string()))?;
        for task_id in tasks_to_revise {
            let Some(task) = plan.groups.iter().flat_map(|g| g.tasks.iter()).find(|t| t.id == task_id).cloned() else {
                continue;
            };
            let base = self.main_branch.clone();
            let view = self.checkout.view_for(&format!("revise-{}", task.id), &base)?;
            let prompt = format!("Revise task {} per synthesis feedback", task.id);
            let instance = self.worker_pool.add_instance(&task, &view, &prompt).await?;
            self.synthesis_orch.record_revision_instance(task.id.clone(), instance.id.clone());
            self.session.with_mut(|s| {
                if let Some(r) = s.revision.as_mut() {
                    r.running_revision_tasks.insert(task.id.clone(), instance.id.clone());
                }
            });
        }
        Ok(())
    }

    /// Records that a revision task finished; when every task in
    /// `TasksToRevise` has finished, Synthesis re-runs.
    pub fn record_revision_task_done(&self, task_id: &str) -> Result<()> {
        self.synthesis_orch.remove_revision_instance(task_id);
        let all_done = self.session.with_mut(|s| {
            if let Some(r) = s.revision.as_mut() {
                r.running_revision_tasks.remove(task_id);
                if !r.revised_tasks.iter().any(|t| t == task_id) {
                    r.revised_tasks.push(task_id.to_string());
                }
                r.tasks_to_revise.iter().all(|t| r.revised_tasks.contains(t))
            } else {
                false
            }
        });
        if all_done {
            self.transition(Phase::Synthesis)?;
        }
        Ok(())
    }

    fn run_consolidation(&self) -> Result<()> {
        let (plan, branches) = self.session.with(|s| (s.plan.clone(), s.group_consolidated_branches.clone()));
        let Some(plan) = plan else {
            self.transition(Phase::Complete)?;
            return Ok(());
        };
        let last_group = plan.groups.len().saturating_sub(1);
        let final_branch = branches.get(&last_group).cloned().unwrap_or_else(|| self.main_branch.clone());
        let group_branches: Vec<String> = branches.values().cloned().collect();
        match self.checkout.merge(&self.main_branch, "flockwork/final", &group_branches, last_group) {
            Ok(outcome) => {
                self.consolidation_orch.record_consolidation_instance(outcome.commit);
                let _ = final_branch;
                self.transition(Phase::Complete)?;
                let id = self.session.with(|s| s.id.clone());
                self.events.emit(Event::Complete { session_id: id });
                Ok(())
            }
            Err(e) => {
                self.session.with_mut(|s| {
                    s.phase = Phase::Failed;
                    s.error = Some(e.to_string());
                });
                let id = self.session.with(|s| s.id.clone());
                self.events.emit(Event::Complete { session_id: id });
                Err(e)
            }
        }
    }

    // ---- Step resolver/restarter (C8, §4.9) ----------------------------

    pub fn resolve_step(&self, instance_id: &str) -> Option<StepInfo> {
        let fallbacks = ResolverFallbacks {
            planning_coordinator_instance: self.planning.coordinator_instance(),
            plan_coordinator_instances: self.planning.plan_coordinator_instances(),
            execution_running_instances: self.execution_orch.running_task_instances(),
            group_consolidator_instances: self.consolidation_orch.group_consolidator_instances(),
            running_revision_instances: self.synthesis_orch.running_revision_instances(),
        };
        self.session.with(|s| resolve_step(s, &fallbacks, instance_id))
    }

    /// `RestartStep`: best-effort stop the existing worker, then dispatch
    /// on the step's type (§4.9).
    pub async fn restart_step(&self, step: &StepInfo) -> Result<()> {
        if !step.instance_id.is_empty() {
            if let Err(e) = self.worker_pool.stop_instance(&step.instance_id).await {
                tracing::warn!(error = %e, instance = %step.instance_id, "best-effort stop before restart failed");
            }
        }

        match step.step_type {
            StepType::Planning => {
                self.planning.reset();
                self.session.with_mut(|s| {
                    s.coordinator_id = None;
                    s.plan = None;
                    s.phase = Phase::Planning;
                });
                Ok(())
            }
            StepType::PlanManager => {
                let multi_pass = self.session.with(|s| s.config.multi_pass);
                if !multi_pass {
                    return Err(Error::InvalidRequest("plan_manager restart requires MultiPass".to_string()));
                }
                self.planning.reset();
                self.session.with_mut(|s| {
                    s.plan_manager_id = None;
                    s.plan = None;
                    s.phase = Phase::PlanSelection;
                });
                Ok(())
            }
            StepType::Task => {
                let running_nonempty = self.session.with(|s| !s.running_tasks.is_empty());
                if running_nonempty {
                    return Err(Error::InvalidRequest("cannot restart a task while tasks are running".to_string()));
                }
                let Some(task_id) = &step.task_id else {
                    return Err(Error::InvalidRequest("task restart requires a task id".to_string()));
                };
                self.execution_orch.remove_running(task_id);
                self.retry.reset(task_id);
                self.session.with_mut(|s| {
                    s.completed_tasks.retain(|t| t != task_id);
                    s.failed_tasks.retain(|t| t != task_id);
                    s.task_to_instance.remove(task_id);
                    s.task_commit_counts.remove(task_id);
                    s.group_decision = None;
                    s.phase = Phase::Executing;
                });
                self.admit_ready_tasks().await
            }
            StepType::Synthesis => {
                self.synthesis_orch.reset();
                self.session.with_mut(|s| {
                    s.synthesis_id = None;
                    s.synthesis_completion = None;
                    s.synthesis_awaiting_approval = false;
                    s.phase = Phase::Synthesis;
                });
                Ok(())
            }
            StepType::Revision => {
                let has_issues = self.session.with(|s| s.revision.as_ref().map(|r| !r.issues.is_empty()).unwrap_or(false));
                if !has_issues {
                    return Err(Error::InvalidRequest("cannot restart revision with no issues".to_string()));
                }
                self.synthesis_orch.reset();
                self.session.with_mut(|s| {
                    if let Some(r) = s.revision.as_mut() {
                        r.reset_progress();
                    }
                    s.phase = Phase::Revision;
                });
                self.run_revision_tasks().await
            }
            StepType::Consolidation => {
                self.consolidation_orch.reset();
                self.session.with_mut(|s| {
                    s.consolidation_id = None;
                    s.phase = Phase::Consolidating;
                });
                self.run_consolidation()
            }
            StepType::GroupConsolidator => {
                let group_count = self.session.with(|s| s.group_count());
                let Some(group) = step.group_index else {
                    return Err(Error::InvalidRequest("group_consolidator restart requires a group index".to_string()));
                };
                if group >= group_count {
                    return Err(Error::InvalidRequest(format!("group index {} out of range", group)));
                }
                self.consolidation_orch.clear_state_for_restart(group);
                self.session.with_mut(|s| {
                    s.group_consolidation_contexts.remove(&group);
                });
                self.consolidate_group(group)
            }
        }
    }

    pub fn retry_manager(&self) -> &RetryManager {
        &self.retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrchestratorConfig;
    use crate::orchestrator::checkout::Checkout;
    use crate::orchestrator::worker_pool::{Instance, InstanceStatus};
    use crate::plan::{Group, Plan, Task};
    use crate::session::NullPersistence;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct StubWorkerPool {
        next_id: StdMutex<u32>,
    }

    #[async_trait]
    impl WorkerPool for StubWorkerPool {
        async fn add_instance(&self, _task: &Task, view: &WorkerView, _prompt: &str) -> Result<Instance> {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            Ok(Instance {
                id: format!("inst-{}", next),
                worktree_path: view.path.clone(),
                branch: view.branch.clone(),
                status: InstanceStatus::Running,
                files_modified: vec![],
            })
        }
        async fn start_instance(&self, _id: &str) -> Result<()> {
            Ok(())
        }
        async fn stop_instance(&self, _id: &str) -> Result<()> {
            Ok(())
        }
        fn get_instance(&self, id: &str) -> Option<Instance> {
            Some(Instance {
                id: id.to_string(),
                worktree_path: "/tmp".into(),
                branch: "flockwork/task-x".to_string(),
                status: InstanceStatus::Running,
                files_modified: vec![],
            })
        }
        async fn poll_task_completions(&self) -> Vec<Completion> {
            vec![]
        }
    }

    struct StubCheckout;
    impl Checkout for StubCheckout {
        fn view_for(&self, task_id: &str, base: &str) -> Result<WorkerView> {
            Ok(WorkerView {
                path: std::path::PathBuf::from(format!("/tmp/{}", task_id)),
                branch: format!("flockwork/task-{}", task_id),
                base_branch: base.to_string(),
            })
        }
        fn merge(&self, _base: &str, _into: &str, branches: &[String], _group: usize) -> Result<crate::git::MergeOutcome> {
            Ok(crate::git::MergeOutcome {
                commit: "deadbeef".to_string(),
                merged_branches: branches.to_vec(),
            })
        }
        fn verify(&self, _view: &WorkerView) -> super::super::verifier::VerificationOutcome {
            super::super::verifier::VerificationOutcome { success: true, commit_count: 1, error: None }
        }
    }

    fn single_task_plan() -> Plan {
        Plan {
            title: "p".to_string(),
            groups: vec![Group {
                tasks: vec![Task {
                    id: "t1".to_string(),
                    title: "do thing".to_string(),
                    dependencies: vec![],
                }],
            }],
        }
    }

    fn coordinator() -> Coordinator {
        let session = Arc::new(SessionStore::new(
            UltraPlanSession::new("s1", "objective", OrchestratorConfig::default()),
            Arc::new(NullPersistence),
        ));
        let pool: Arc<dyn WorkerPool> = Arc::new(StubWorkerPool { next_id: StdMutex::new(0) });
        let checkout: Arc<dyn Checkout> = Arc::new(StubCheckout);
        Coordinator::new(session, pool, checkout, "main")
    }

    #[tokio::test]
    async fn test_single_group_single_task_success_scenario() {
        let coord = coordinator();
        coord.accept_plan(single_task_plan()).unwrap();
        assert_eq!(coord.session.with(|s| s.phase), Phase::Executing);

        coord.admit_ready_tasks().await.unwrap();
        let instance_id = coord.session.with(|s| s.running_tasks.get("t1").cloned().unwrap());

        coord
            .handle_completion(Completion {
                instance_id,
                task_id: Some("t1".to_string()),
                success: true,
                needs_retry: false,
            })
            .unwrap();

        coord.session.with(|s| {
            assert_eq!(s.completed_tasks, vec!["t1".to_string()]);
            assert_eq!(s.task_commit_counts.get("t1"), Some(&1));
            assert_eq!(s.phase, Phase::Synthesis);
        });
    }

    #[tokio::test]
    async fn test_partial_failure_pauses_without_consolidating() {
        let coord = coordinator();
        let plan = Plan {
            title: "p".to_string(),
            groups: vec![
                Group {
                    tasks: vec![
                        Task { id: "t00".to_string(), title: "a".to_string(), dependencies: vec![] },
                        Task { id: "t01".to_string(), title: "b".to_string(), dependencies: vec![] },
                    ],
                },
                Group {
                    tasks: vec![Task { id: "t10".to_string(), title: "c".to_string(), dependencies: vec![] }],
                },
            ],
        };
        coord.accept_plan(plan).unwrap();
        coord.admit_ready_tasks().await.unwrap();

        let inst00 = coord.session.with(|s| s.running_tasks.get("t00").cloned().unwrap());
        let inst01 = coord.session.with(|s| s.running_tasks.get("t01").cloned().unwrap());

        coord
            .handle_completion(Completion { instance_id: inst00, task_id: Some("t00".to_string()), success: true, needs_retry: false })
            .unwrap();
        coord
            .handle_completion(Completion { instance_id: inst01, task_id: Some("t01".to_string()), success: false, needs_retry: false })
            .unwrap();

        coord.session.with(|s| {
            assert!(s.group_decision.as_ref().unwrap().awaiting_decision);
            assert_eq!(s.current_group, 0);
            assert_eq!(s.phase, Phase::Executing);
        });
    }

    #[test]
    fn test_resolve_step_unknown_returns_none() {
        let coord = coordinator();
        assert!(coord.resolve_step("nope").is_none());
    }
}
