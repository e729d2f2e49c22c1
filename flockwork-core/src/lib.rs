//! Flockwork Core - Core library for Flockwork multi-agent orchestration
//!
//! This crate provides the core functionality for orchestrating multiple
//! AI agents working collaboratively on software development tasks.

pub mod agent;
pub mod config;
pub mod error;
pub mod git;
pub mod orchestrator;
pub mod plan;
pub mod session;

pub use agent::{
    AgentFactory, AgentHandle, AgentSpawner, AgentType, Backend, BackendRegistry, ClaudeBackend,
    CoordinatorAgent, CostInfo, CursorBackend, ImplementAgent, OutputStreamer, PrintHandler,
    PromptBuilder, PromptContext, ReviewAgent, StreamHandler, StreamMessage, TestAgent, TypedAgent,
};
pub use config::{AgentConfig, Config};
pub use error::{Error, Result};
pub use git::{
    cached_repo_path, clone_repo, default_cache_dir, default_repos_cache_dir, fetch_repo,
    is_repo_cached, worktree_path, BranchingOptions, BranchingPoint, CachedWorktree, GitRepo,
    MergeOutcome, PoolConfig, RemoteInfo, RepoUrl, WorktreeInfo, WorktreeMetadata,
    WorktreeOptions, WorktreePool, WorktreeStatus,
};
pub use plan::{parse_plan, Group, Plan, Task};
pub use session::{
    AdversarialConfig, AdversarialPhase, AdversarialSession, GroupDecision, Issue, Phase,
    RevisionState, Severity, SessionStore, UltraPlanSession,
};
