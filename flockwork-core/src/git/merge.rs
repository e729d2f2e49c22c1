//! Branch merging for group and plan consolidation
//!
//! Mirrors `worktree::create_worktree`'s approach of shelling out to the
//! system `git` binary rather than driving `git2`'s merge machinery
//! directly: merge conflict reporting via porcelain exit codes is simpler
//! to reason about than libgit2's index-based merge API.

use std::path::Path;
use std::process::Command;

use super::repo::GitRepo;
use crate::{Error, Result};

/// Outcome of attempting to merge one or more branches into a target.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The resulting commit SHA on the target branch.
    pub commit: String,
    /// Branches that were merged in, in the order they were applied.
    pub merged_branches: Vec<String>,
}

impl GitRepo {
    /// Create `into_branch` from `base` if it does not already exist, then
    /// merge each of `branches` into it in order.
    ///
    /// Returns `ConsolidationFailure` naming the group on the first branch
    /// that fails to merge cleanly (conflict, or the `git merge` process
    /// exiting non-zero for any other reason); branches merged before the
    /// failure remain merged, matching "best effort up to the failure"
    /// semantics worker-driven consolidation expects.
    pub fn consolidate_branches(
        &self,
        base: &str,
        into_branch: &str,
        branches: &[String],
        group: usize,
    ) -> Result<MergeOutcome> {
        let root = self.root();

        if !branch_exists(root, into_branch)? {
            run_git(root, &["branch", into_branch, base], group)?;
        }

        run_git(root, &["checkout", into_branch], group)?;

        let mut merged_branches = Vec::with_capacity(branches.len());
        for branch in branches {
            let status = Command::new("git")
                .current_dir(root)
                .args(["merge", "--no-ff", "--no-edit", branch])
                .status()
                .map_err(Error::Io)?;

            if !status.success() {
                let _ = Command::new("git")
                    .current_dir(root)
                    .args(["merge", "--abort"])
                    .status();
                return Err(Error::ConsolidationFailure {
                    group,
                    reason: format!("merge of branch '{}' into '{}' failed", branch, into_branch),
                });
            }
            merged_branches.push(branch.clone());
        }

        let commit = self.resolve_commit(into_branch)?;
        Ok(MergeOutcome {
            commit,
            merged_branches,
        })
    }
}

fn branch_exists(root: &Path, branch: &str) -> Result<bool> {
    let status = Command::new("git")
        .current_dir(root)
        .args(["show-ref", "--verify", "--quiet", &format!("refs/heads/{}", branch)])
        .status()
        .map_err(Error::Io)?;
    Ok(status.success())
}

fn run_git(root: &Path, args: &[&str], group: usize) -> Result<()> {
    let status = Command::new("git")
        .current_dir(root)
        .args(args)
        .status()
        .map_err(Error::Io)?;
    if !status.success() {
        return Err(Error::ConsolidationFailure {
            group,
            reason: format!("git {} failed", args.join(" ")),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_outcome_records_order() {
        let outcome = MergeOutcome {
            commit: "abc123".to_string(),
            merged_branches: vec!["task/a".to_string(), "task/b".to_string()],
        };
        assert_eq!(outcome.merged_branches[0], "task/a");
        assert_eq!(outcome.merged_branches.len(), 2);
    }
}
