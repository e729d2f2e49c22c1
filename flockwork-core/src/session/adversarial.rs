//! The adversarial session: implementer/reviewer cycle state (§3, §4.10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of one adversarial session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdversarialPhase {
    #[default]
    Implementing,
    Reviewing,
    Approved,
    Complete,
    Failed,
    Stuck,
}

/// Which of the two roles in a round the coordinator is referring to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Implementer,
    Reviewer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Implementer => write!(f, "implementer"),
            Role::Reviewer => write!(f, "reviewer"),
        }
    }
}

/// Config knobs for an adversarial session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdversarialConfig {
    /// 0 means unbounded.
    pub max_iterations: u32,
    /// In `[1, 10]`.
    pub min_passing_score: u8,
}

impl Default for AdversarialConfig {
    fn default() -> Self {
        Self {
            max_iterations: 0,
            min_passing_score: 7,
        }
    }
}

/// The implementer's `.claudio-adversarial-incremental.json` artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementFile {
    pub round: u32,
    pub status: IncrementStatus,
    pub summary: String,
    pub files_modified: Vec<String>,
    pub approach: String,
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncrementStatus {
    ReadyForReview,
    Failed,
}

/// The reviewer's `.claudio-adversarial-review.json` artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFile {
    pub round: u32,
    pub approved: bool,
    pub score: u8,
    pub strengths: Vec<String>,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
    pub summary: String,
    pub required_changes: Vec<String>,
}

/// One round of the implementer/reviewer cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub round: u32,
    pub increment: Option<IncrementFile>,
    pub review: Option<ReviewFile>,
    pub started_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub sub_group_id: Option<String>,
    pub implementer_id: Option<String>,
    pub reviewer_id: Option<String>,
}

impl Round {
    pub fn new(round: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            round,
            increment: None,
            review: None,
            started_at,
            reviewed_at: None,
            sub_group_id: None,
            implementer_id: None,
            reviewer_id: None,
        }
    }
}

/// The full mutable state of one adversarial run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdversarialSession {
    pub id: String,
    pub task: String,
    pub phase: AdversarialPhase,
    pub config: AdversarialConfig,
    pub implementer_id: Option<String>,
    pub reviewer_id: Option<String>,
    pub worktree_path: Option<String>,
    pub current_round: u32,
    pub history: Vec<Round>,
    pub stuck_role: Option<Role>,
    pub error: Option<String>,

    /// Timestamp of the first observed "completed without sentinel" for
    /// the role currently being watched; cleared once the sentinel
    /// appears or the grace period elapses into `Stuck`. Not part of the
    /// spec's listed session fields (§3) but needed to implement the
    /// stuck-detection state machine (§4.10) without a separate
    /// component; persisted alongside the session so a restart doesn't
    /// lose an in-progress grace window.
    pub stuck_watch_started_at: Option<DateTime<Utc>>,
}

impl AdversarialSession {
    pub fn new(
        id: impl Into<String>,
        task: impl Into<String>,
        config: AdversarialConfig,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            task: task.into(),
            phase: AdversarialPhase::Implementing,
            config,
            implementer_id: None,
            reviewer_id: None,
            worktree_path: None,
            current_round: 1,
            history: vec![Round::new(1, started_at)],
            stuck_role: None,
            error: None,
            stuck_watch_started_at: None,
        }
    }

    pub fn current_round_mut(&mut self) -> &mut Round {
        let round = self.current_round;
        self.history
            .iter_mut()
            .rev()
            .find(|r| r.round == round)
            .expect("current round always has a history entry")
    }

    pub fn current_round_ref(&self) -> &Round {
        let round = self.current_round;
        self.history
            .iter()
            .rev()
            .find(|r| r.round == round)
            .expect("current round always has a history entry")
    }

    /// `CurrentRound > MaxIterations`, with 0 meaning unbounded.
    pub fn is_max_iterations_reached(&self) -> bool {
        self.config.max_iterations != 0 && self.current_round > self.config.max_iterations
    }

    pub fn group_base_id(&self) -> &str {
        &self.id
    }
}
