//! Ultra-plan artifact parser
//!
//! The planning orchestrator does not itself decompose an objective — a
//! planning worker does, writing its plan as a Markdown document to its
//! view. This module turns that document into the dependency-ordered
//! `Plan` the coordinator operates on. The table-driven parsing approach
//! mirrors the PLAN.md parser this crate is descended from: phases became
//! groups, PRs became tasks, and an explicit `Depends-On` column replaces
//! positional inference.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One task within a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier, e.g. "t1" or "PR-003".
    pub id: String,
    /// Human-readable title.
    pub title: String,
    /// IDs of tasks that must complete before this one is admitted.
    pub dependencies: Vec<String>,
}

/// One level of the dependency-ordered plan. Tasks within a group may run
/// in parallel once their cross-group dependencies are satisfied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    pub tasks: Vec<Task>,
}

impl Group {
    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.id.as_str())
    }
}

/// A dependency-ordered plan produced by a planning worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub title: String,
    pub groups: Vec<Group>,
}

impl Plan {
    /// Total number of tasks across all groups.
    pub fn total_tasks(&self) -> usize {
        self.groups.iter().map(|g| g.tasks.len()).sum()
    }

    /// Find which group (by index) a task belongs to.
    pub fn group_of(&self, task_id: &str) -> Option<usize> {
        self.groups
            .iter()
            .position(|g| g.tasks.iter().any(|t| t.id == task_id))
    }

    /// Validate that every dependency refers to a real task and that no
    /// task depends on one in the same or a later group (forward-only
    /// dependencies, consistent with group-sequential execution).
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for group in &self.groups {
            for task in &group.tasks {
                if !seen.insert(task.id.as_str()) {
                    return Err(Error::MalformedArtifact(format!(
                        "duplicate task id '{}' in plan",
                        task.id
                    )));
                }
            }
        }

        let mut known_ids: HashSet<&str> = HashSet::new();
        for group in &self.groups {
            for task in &group.tasks {
                for dep in &task.dependencies {
                    if !known_ids.contains(dep.as_str()) {
                        return Err(Error::MalformedArtifact(format!(
                            "task '{}' depends on unknown or later task '{}'",
                            task.id, dep
                        )));
                    }
                }
            }
            for task in &group.tasks {
                known_ids.insert(task.id.as_str());
            }
        }
        Ok(())
    }
}

/// Parse a planning worker's Markdown plan artifact.
///
/// Expected shape:
/// ```text
/// # Objective title
///
/// ### Group 0
/// | Task | Title | Depends-On |
/// |------|-------|------------|
/// | t1   | Add parser | |
/// | t2   | Add CLI flag | t1 |
/// ```
pub fn parse_plan(content: &str) -> Result<Plan> {
    let mut plan = Plan::default();
    let mut current_group: Option<Group> = None;
    let mut in_table = false;

    for line in content.lines() {
        let line = line.trim();

        if line.starts_with("# ") && plan.title.is_empty() {
            plan.title = line[2..].trim().to_string();
            continue;
        }

        if line.strip_prefix("### Group ").is_some() {
            if let Some(group) = current_group.take() {
                plan.groups.push(group);
            }
            current_group = Some(Group::default());
            in_table = false;
            continue;
        }

        if current_group.is_none() {
            continue;
        }

        if line.starts_with("| Task") {
            in_table = true;
            continue;
        }
        if line.starts_with("|---") || line.starts_with("| ---") {
            continue;
        }

        if in_table && line.starts_with('|') {
            if let Some(task) = parse_task_row(line) {
                current_group.as_mut().unwrap().tasks.push(task);
            }
        }
    }

    if let Some(group) = current_group.take() {
        plan.groups.push(group);
    }

    if plan.groups.is_empty() {
        return Err(Error::MalformedArtifact(
            "plan artifact contains no groups".to_string(),
        ));
    }

    plan.validate()?;
    Ok(plan)
}

fn parse_task_row(line: &str) -> Option<Task> {
    let cols: Vec<&str> = line
        .trim_matches('|')
        .split('|')
        .map(|c| c.trim())
        .collect();
    if cols.len() < 2 || cols[0].is_empty() {
        return None;
    }

    let id = cols[0].to_string();
    let title = cols.get(1).copied().unwrap_or_default().to_string();
    let dependencies = cols
        .get(2)
        .copied()
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();

    Some(Task {
        id,
        title,
        dependencies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_group() {
        let content = "# Build a widget\n\n### Group 0\n| Task | Title | Depends-On |\n|---|---|---|\n| t1 | Add widget struct | |\n";
        let plan = parse_plan(content).unwrap();
        assert_eq!(plan.title, "Build a widget");
        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].tasks.len(), 1);
        assert_eq!(plan.groups[0].tasks[0].id, "t1");
        assert!(plan.groups[0].tasks[0].dependencies.is_empty());
    }

    #[test]
    fn test_parse_multi_group_with_dependency() {
        let content = "# Objective\n\n### Group 0\n| Task | Title | Depends-On |\n|---|---|---|\n| t00 | first | |\n\n### Group 1\n| Task | Title | Depends-On |\n|---|---|---|\n| t10 | second | t00 |\n";
        let plan = parse_plan(content).unwrap();
        assert_eq!(plan.groups.len(), 2);
        assert_eq!(plan.groups[1].tasks[0].dependencies, vec!["t00".to_string()]);
        assert_eq!(plan.total_tasks(), 2);
        assert_eq!(plan.group_of("t10"), Some(1));
    }

    #[test]
    fn test_validate_rejects_unknown_dependency() {
        let mut plan = Plan::default();
        plan.groups.push(Group {
            tasks: vec![Task {
                id: "t1".to_string(),
                title: "a".to_string(),
                dependencies: vec!["ghost".to_string()],
            }],
        });
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_task_id() {
        let mut plan = Plan::default();
        plan.groups.push(Group {
            tasks: vec![
                Task {
                    id: "t1".to_string(),
                    title: "a".to_string(),
                    dependencies: vec![],
                },
                Task {
                    id: "t1".to_string(),
                    title: "b".to_string(),
                    dependencies: vec![],
                },
            ],
        });
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_parse_empty_plan_is_error() {
        assert!(parse_plan("# Nothing here").is_err());
    }
}
