//! Checkout: the source-tree view collaborator the step orchestrators use
//! to give each task its own isolated worktree and to fold completed
//! branches back together during consolidation.

use crate::git::{BranchingOptions, GitRepo, MergeOutcome, WorktreeOptions};
use crate::orchestrator::verifier::{verify_outcome, VerificationOutcome};
use crate::orchestrator::worker_pool::WorkerView;
use crate::Result;

/// Produces isolated worker views and merges their results back.
pub trait Checkout: Send + Sync {
    /// Create (or reuse) an isolated view for `task_id`, branched from
    /// `base`.
    fn view_for(&self, task_id: &str, base: &str) -> Result<WorkerView>;
    /// Fold `branches` into `into_branch`, itself branched from `base` if
    /// it does not already exist.
    fn merge(&self, base: &str, into_branch: &str, branches: &[String], group: usize) -> Result<MergeOutcome>;
    /// Checks a worker's claimed completion against its view: the
    /// completion sentinel must be present and the branch must carry at
    /// least one commit over `base_branch` (§4.6). The retry decision
    /// itself belongs to the caller's `RetryManager`, not here.
    fn verify(&self, view: &WorkerView) -> VerificationOutcome;
}

/// A `Checkout` backed by real git worktrees under the repository's
/// default cache directory.
pub struct GitCheckout {
    repo: GitRepo,
}

impl GitCheckout {
    pub fn new(repo: GitRepo) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &GitRepo {
        &self.repo
    }
}

impl Checkout for GitCheckout {
    fn view_for(&self, task_id: &str, base: &str) -> Result<WorkerView> {
        let branching_point = self.repo.find_branching_point(&BranchingOptions {
            base_branch: Some(base.to_string()),
            fetch: false,
            remote: None,
        })?;

        let branch_name = format!("flockwork/task-{}", task_id);
        let worktree_info = self.repo.create_cached_worktree(
            &branching_point,
            &WorktreeOptions {
                branch_name: branch_name.clone(),
                force: false,
            },
        )?;

        Ok(WorkerView {
            path: worktree_info.path,
            branch: branch_name,
            base_branch: base.to_string(),
        })
    }

    fn merge(&self, base: &str, into_branch: &str, branches: &[String], group: usize) -> Result<MergeOutcome> {
        self.repo.consolidate_branches(base, into_branch, branches, group)
    }

    fn verify(&self, view: &WorkerView) -> VerificationOutcome {
        verify_outcome(&self.repo, &view.path, &view.base_branch, &view.branch)
    }
}
