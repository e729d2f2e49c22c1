//! Verifier (C5): decides whether a worker's claimed completion is real
//! (§4.6). Success requires both a completion sentinel and at least one
//! commit on the worker's branch; anything else routes through the
//! `RetryManager`.

use std::path::Path;

use crate::git::GitRepo;
use crate::orchestrator::retry::RetryManager;

/// Name of the per-task completion sentinel a worker writes into its
/// worktree when it believes its task is done. Distinct from the
/// adversarial handshake's `.claudio-adversarial-*.json` files (§4.10).
pub const TASK_COMPLETION_FILE: &str = ".flockwork-task-complete";

/// Outcome of verifying one task's claimed completion.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub success: bool,
    pub needs_retry: bool,
    pub commit_count: usize,
    pub error: Option<String>,
}

impl VerificationResult {
    fn success(commit_count: usize) -> Self {
        Self {
            success: true,
            needs_retry: false,
            commit_count,
            error: None,
        }
    }

    fn failure(needs_retry: bool, commit_count: usize, error: impl Into<String>) -> Self {
        Self {
            success: false,
            needs_retry,
            commit_count,
            error: Some(error.into()),
        }
    }
}

/// Pure outcome of checking a worker's claimed completion, without a
/// retry decision attached: the sentinel must exist and the branch must
/// carry at least one commit over `base`.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub success: bool,
    pub commit_count: usize,
    pub error: Option<String>,
}

/// Polls for the per-task completion sentinel in a worker's worktree.
/// Pure existence check; does not validate contents.
pub fn check_for_task_completion_file(worktree_path: &Path) -> bool {
    worktree_path.join(TASK_COMPLETION_FILE).exists()
}

/// Verifies a task's claimed completion against its git branch. Shared
/// by `Verifier::verify_task_work` (which also grants retries) and
/// `Checkout::verify` implementations that have no `RetryManager` to
/// consult.
pub fn verify_outcome(repo: &GitRepo, worktree_path: &Path, base: &str, branch: &str) -> VerificationOutcome {
    if !check_for_task_completion_file(worktree_path) {
        return VerificationOutcome {
            success: false,
            commit_count: 0,
            error: Some("completion sentinel not found".to_string()),
        };
    }

    match repo.count_commits_since(base, branch) {
        Ok(0) => VerificationOutcome {
            success: false,
            commit_count: 0,
            error: Some("no commits found on branch".to_string()),
        },
        Ok(count) => VerificationOutcome {
            success: true,
            commit_count: count,
            error: None,
        },
        Err(e) => VerificationOutcome {
            success: false,
            commit_count: 0,
            error: Some(format!("failed to count commits: {e}")),
        },
    }
}

/// Checks worker output for completion and commit evidence, granting
/// retries for a failed attempt through a `RetryManager`.
pub struct Verifier<'a> {
    repo: &'a GitRepo,
    retry: &'a RetryManager,
}

impl<'a> Verifier<'a> {
    pub fn new(repo: &'a GitRepo, retry: &'a RetryManager) -> Self {
        Self { repo, retry }
    }

    /// Polls for the per-task completion sentinel in the worker's
    /// worktree. Pure existence check; does not validate contents.
    pub fn check_for_task_completion_file(&self, worktree_path: &Path) -> bool {
        check_for_task_completion_file(worktree_path)
    }

    /// Verifies a task's claimed completion: the sentinel must exist and
    /// the worker's branch must carry at least one commit over `base`.
    /// A missing sentinel or zero commits is a failure; whether the
    /// caller gets another attempt is delegated to the `RetryManager`.
    pub fn verify_task_work(&self, task_id: &str, worktree_path: &Path, base: &str, branch: &str) -> VerificationResult {
        let outcome = verify_outcome(self.repo, worktree_path, base, branch);
        if outcome.success {
            return VerificationResult::success(outcome.commit_count);
        }
        let needs_retry = self.retry.grant_retry(task_id);
        VerificationResult::failure(needs_retry, outcome.commit_count, outcome.error.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_repo() -> (TempDir, GitRepo) {
        let dir = TempDir::new().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        {
            let sig = git2::Signature::now("test", "test@example.com").unwrap();
            let tree_id = {
                let mut index = repo.index().unwrap();
                index.write_tree().unwrap()
            };
            let tree = repo.find_tree(tree_id).unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).unwrap();
        }
        let repo = GitRepo::open(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn test_missing_sentinel_is_not_complete() {
        let (dir, _repo) = init_repo();
        assert!(!Path::new(dir.path()).join(TASK_COMPLETION_FILE).exists());
    }

    #[test]
    fn test_verify_fails_without_sentinel_and_grants_retry() {
        let (dir, repo) = init_repo();
        let retry = RetryManager::new(3);
        let verifier = Verifier::new(&repo, &retry);
        let result = verifier.verify_task_work("t1", dir.path(), "HEAD", "HEAD");
        assert!(!result.success);
        assert!(result.needs_retry);
        assert_eq!(retry.attempts("t1"), 1);
    }

    #[test]
    fn test_verify_exhausts_retry_budget() {
        let (dir, repo) = init_repo();
        let retry = RetryManager::new(1);
        let verifier = Verifier::new(&repo, &retry);
        let result = verifier.verify_task_work("t1", dir.path(), "HEAD", "HEAD");
        assert!(!result.success);
        assert!(!result.needs_retry);
    }

    #[test]
    fn test_verify_succeeds_with_sentinel_and_commit() {
        let (dir, repo) = init_repo();
        std::fs::write(dir.path().join(TASK_COMPLETION_FILE), "done").unwrap();

        let sig = git2::Signature::now("test", "test@example.com").unwrap();
        let base_oid = repo.inner().head().unwrap().target().unwrap();
        std::fs::write(dir.path().join("work.txt"), "content").unwrap();
        {
            let mut index = repo.inner().index().unwrap();
            index.add_path(Path::new("work.txt")).unwrap();
            index.write().unwrap();
        }
        let tree_id = repo.inner().index().unwrap().write_tree().unwrap();
        let tree = repo.inner().find_tree(tree_id).unwrap();
        let parent = repo.inner().find_commit(base_oid).unwrap();
        repo.inner()
            .commit(Some("HEAD"), &sig, &sig, "work", &tree, &[&parent])
            .unwrap();

        let retry = RetryManager::new(3);
        let verifier = Verifier::new(&repo, &retry);
        let result = verifier.verify_task_work("t1", dir.path(), &base_oid.to_string(), "HEAD");
        assert!(result.success);
        assert_eq!(result.commit_count, 1);
    }
}
