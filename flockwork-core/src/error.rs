//! Error types for Flockwork
//!
//! The taxonomy below distinguishes errors the coordinator recovers from
//! locally (`TransientWorkerFailure`) from errors that are always surfaced
//! as a hard `Phase::Failed` (everything else). `Stuck` is deliberately not
//! folded into `Fatal`: it is recoverable via `RestartStuckRole`.

use thiserror::Error;

/// Result type alias for Flockwork operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Flockwork operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Agent execution error
    #[error("Agent error: {0}")]
    Agent(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-facing precondition violation: restart a task while tasks are
    /// running, restart a revision with no issues, group index out of range.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A worker exited without success; eligible for retry if the
    /// `RetryManager` grants another attempt.
    #[error("Transient worker failure for task {task_id}: {reason}")]
    TransientWorkerFailure { task_id: String, reason: String },

    /// Retry budget exhausted, or a verification hard fail (commit count
    /// zero after retries).
    #[error("Permanent worker failure for task {task_id}: {reason}")]
    PermanentWorkerFailure { task_id: String, reason: String },

    /// Checkout/Merge reported a conflict, or the consolidation worker
    /// failed.
    #[error("Consolidation failure for group {group}: {reason}")]
    ConsolidationFailure { group: usize, reason: String },

    /// A sentinel file was present but failed schema validation after
    /// sanitization.
    #[error("Malformed artifact: {0}")]
    MalformedArtifact(String),

    /// A worker exited without writing its required sentinel within the
    /// grace window.
    #[error("Stuck: {role} produced no sentinel after the grace period")]
    Stuck { role: String },

    /// Any unexpected condition breaking an invariant. Always reported up
    /// as Failed.
    #[error("Fatal error: {0}")]
    Fatal(String),

    /// Generic error with message, retained for the ambient agent/git/config
    /// layers that predate the orchestration-specific taxonomy above.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is eligible for local recovery by the
    /// `RetryManager` rather than surfacing as `Phase::Failed`.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientWorkerFailure { .. })
    }

    /// Whether this error represents the adversarial coordinator's
    /// recoverable `Stuck` phase rather than a hard failure.
    pub fn is_stuck(&self) -> bool {
        matches!(self, Error::Stuck { .. })
    }
}
