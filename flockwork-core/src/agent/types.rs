//! Agent type definitions for Flockwork
//!
//! Different agent types have specialized prompts and behaviors:
//! - Implement: Writes code to implement features
//! - Test: Writes tests and validates implementations
//! - Review: Reviews code changes and provides feedback
//! - Coordinator: Orchestrates other agents and manages workflow

use serde::{Deserialize, Serialize};
use std::fmt;

/// The type of agent to spawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    /// Implementation agent - writes code to implement features
    #[default]
    Implement,
    /// Test agent - writes tests and validates implementations
    Test,
    /// Review agent - reviews code changes and provides feedback
    Review,
    /// Coordinator agent - orchestrates workflow and delegates tasks
    Coordinator,
}

impl AgentType {
    /// Get all available agent types
    pub fn all() -> &'static [AgentType] {
        &[
            AgentType::Implement,
            AgentType::Test,
            AgentType::Review,
            AgentType::Coordinator,
        ]
    }

    /// Get the short name for this agent type
    pub fn name(&self) -> &'static str {
        match self {
            AgentType::Implement => "implement",
            AgentType::Test => "test",
            AgentType::Review => "review",
            AgentType::Coordinator => "coordinator",
        }
    }

    /// Get a description of what this agent type does
    pub fn description(&self) -> &'static str {
        match self {
            AgentType::Implement => "Writes code to implement features and fix bugs",
            AgentType::Test => "Writes tests and validates implementations",
            AgentType::Review => "Reviews code changes and provides feedback",
            AgentType::Coordinator => "Orchestrates workflow and delegates to other agents",
        }
    }

    /// Whether this agent type can spawn other agents
    pub fn can_spawn_agents(&self) -> bool {
        matches!(self, AgentType::Coordinator)
    }

    /// Whether this agent type should run in isolation
    pub fn runs_isolated(&self) -> bool {
        // Review agents see the diff but don't modify code
        matches!(self, AgentType::Review)
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "implement" | "impl" | "i" => Ok(AgentType::Implement),
            "test" | "t" => Ok(AgentType::Test),
            "review" | "r" => Ok(AgentType::Review),
            "coordinator" | "coord" | "c" => Ok(AgentType::Coordinator),
            _ => Err(format!("Unknown agent type: {}", s)),
        }
    }
}
