//! The ultra-plan session: the coordinator's entire mutable state.
//!
//! Every field here is read or written only through `SessionStore`
//! (`super::store`); this module defines the shape, not the access
//! discipline.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::OrchestratorConfig;
use crate::orchestrator::retry::RetryState;
use crate::plan::Plan;

/// Phase state machine for an ultra-plan session. See `§4.2` of the
/// design: only the edges the coordinator implements are legal
/// transitions, enforced by `Coordinator::transition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Planning,
    PlanSelection,
    Executing,
    Synthesis,
    Revision,
    Consolidating,
    Complete,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Planning => "planning",
            Phase::PlanSelection => "plan_selection",
            Phase::Executing => "executing",
            Phase::Synthesis => "synthesis",
            Phase::Revision => "revision",
            Phase::Consolidating => "consolidating",
            Phase::Complete => "complete",
            Phase::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Severity of a synthesis-reported issue. Only `Critical`/`Major`
/// trigger revision; `Minor` never does (P8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

impl Severity {
    pub fn triggers_revision(self) -> bool {
        matches!(self, Severity::Critical | Severity::Major)
    }
}

/// A single issue reported by the synthesis worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub task_id: String,
    pub description: String,
    pub files: Vec<String>,
    pub severity: Severity,
}

/// Revision sub-phase state. Issues survive a step restart (I7); only
/// progress resets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevisionState {
    pub issues: Vec<Issue>,
    pub tasks_to_revise: Vec<String>,
    pub revised_tasks: Vec<String>,
    pub running_revision_tasks: HashMap<String, String>,
    pub revision_round: u32,
}

impl RevisionState {
    /// True iff any retained issue has a revision-triggering severity.
    pub fn needs_revision(&self) -> bool {
        self.issues.iter().any(|i| i.severity.triggers_revision())
    }

    /// Unique task IDs across issues that trigger revision, in first-seen
    /// order (matches scenario 5: `[t0, t1]` not `[t0, t1, t0]`).
    pub fn tasks_needing_revision(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for issue in &self.issues {
            if issue.severity.triggers_revision() && seen.insert(issue.task_id.clone()) {
                out.push(issue.task_id.clone());
            }
        }
        out
    }

    /// Reset progress tracking for a revision restart while keeping
    /// `issues` (and hence `tasks_to_revise`, recomputed from them).
    pub fn reset_progress(&mut self) {
        self.tasks_to_revise = self.tasks_needing_revision();
        self.revised_tasks.clear();
        self.running_revision_tasks.clear();
    }
}

/// Set only at a partial-failure pause; cleared once the operator
/// resolves the decision (I6, P4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDecision {
    pub group_index: usize,
    pub awaiting_decision: bool,
}

/// The full mutable state of one ultra-plan run (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UltraPlanSession {
    pub id: String,
    pub objective: String,
    pub phase: Phase,
    pub config: OrchestratorConfig,

    pub plan: Option<Plan>,

    pub coordinator_id: Option<String>,
    pub plan_manager_id: Option<String>,
    pub plan_coordinator_ids: Vec<String>,

    pub task_to_instance: HashMap<String, String>,
    pub completed_tasks: Vec<String>,
    pub failed_tasks: Vec<String>,
    pub task_commit_counts: HashMap<String, u64>,
    pub task_retries: HashMap<String, RetryState>,
    pub running_tasks: HashMap<String, String>,

    pub synthesis_id: Option<String>,
    pub synthesis_awaiting_approval: bool,
    pub synthesis_completion: Option<String>,
    pub revision: Option<RevisionState>,

    pub consolidation_id: Option<String>,
    pub group_consolidator_ids: Vec<Option<String>>,
    pub group_consolidated_branches: HashMap<usize, String>,
    pub group_consolidation_contexts: HashMap<usize, String>,
    pub group_decision: Option<GroupDecision>,

    pub current_group: usize,
    pub error: Option<String>,
}

impl UltraPlanSession {
    pub fn new(id: impl Into<String>, objective: impl Into<String>, config: OrchestratorConfig) -> Self {
        Self {
            id: id.into(),
            objective: objective.into(),
            phase: Phase::Planning,
            config,
            plan: None,
            coordinator_id: None,
            plan_manager_id: None,
            plan_coordinator_ids: Vec::new(),
            task_to_instance: HashMap::new(),
            completed_tasks: Vec::new(),
            failed_tasks: Vec::new(),
            task_commit_counts: HashMap::new(),
            task_retries: HashMap::new(),
            running_tasks: HashMap::new(),
            synthesis_id: None,
            synthesis_awaiting_approval: false,
            synthesis_completion: None,
            revision: None,
            consolidation_id: None,
            group_consolidator_ids: Vec::new(),
            group_consolidated_branches: HashMap::new(),
            group_consolidation_contexts: HashMap::new(),
            group_decision: None,
            current_group: 0,
            error: None,
        }
    }

    /// (I1) A task ID appears in at most one of the three sets.
    pub fn task_state_is_consistent(&self, task_id: &str) -> bool {
        let in_running = self.running_tasks.contains_key(task_id);
        let in_completed = self.completed_tasks.iter().any(|t| t == task_id);
        let in_failed = self.failed_tasks.iter().any(|t| t == task_id);
        (in_running as u8 + in_completed as u8 + in_failed as u8) <= 1
    }

    pub fn total_tasks(&self) -> usize {
        self.plan.as_ref().map(Plan::total_tasks).unwrap_or(0)
    }

    pub fn completed_count(&self) -> usize {
        self.completed_tasks.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed_tasks.len()
    }

    /// (P2) completed + failed + running <= total.
    pub fn counts_are_consistent(&self) -> bool {
        self.completed_count() + self.failed_count() + self.running_tasks.len() <= self.total_tasks()
    }

    pub fn group_count(&self) -> usize {
        self.plan.as_ref().map(|p| p.groups.len()).unwrap_or(0)
    }
}
