//! The orchestration engine (§4): the ultra-plan coordinator and its
//! phase orchestrators, plus the independent adversarial coordinator.

mod adversarial;
mod checkout;
mod consolidation;
mod coordinator;
mod events;
mod execution;
mod group_tracker;
mod planning;
mod retry;
mod step;
mod synthesis;
mod verifier;
mod worker_pool;

pub use adversarial::{
    parse_increment_file, parse_review_file, sanitize_sentinel_json, AdversarialCoordinator,
    INCREMENT_SENTINEL_FILE, REVIEW_SENTINEL_FILE,
};
pub use checkout::{Checkout, GitCheckout};
pub use consolidation::ConsolidationOrchestrator;
pub use coordinator::{Coordinator, GroupResolution};
pub use events::{Callback, Event, EventBus};
pub use execution::{base_branch_for_group, ready_tasks, ExecutionOrchestrator};
pub use group_tracker::GroupTracker;
pub use planning::PlanningOrchestrator;
pub use retry::{RetryManager, RetryState};
pub use step::{resolve_step, ResolverFallbacks, StepInfo, StepType};
pub use synthesis::{SynthesisOrchestrator, SynthesisReport};
pub use verifier::{
    check_for_task_completion_file, verify_outcome, VerificationOutcome, VerificationResult,
    Verifier, TASK_COMPLETION_FILE,
};
pub use worker_pool::{Completion, Instance, InstanceStatus, LocalWorkerPool, WorkerPool, WorkerView};
