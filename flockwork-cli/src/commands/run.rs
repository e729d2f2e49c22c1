//! Run command - Execute a task with Flockwork agents

use clap::Args;
use flockwork_core::Config;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// The task prompt describing what to accomplish
    #[arg(required = true)]
    pub prompt: String,

    /// Working directory for the task (defaults to current directory)
    #[arg(short = 'd', long, default_value = ".")]
    pub workdir: String,

    /// Number of parallel agents to use
    #[arg(short = 'n', long, default_value = "1")]
    pub agents: u32,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, verbose: bool, config: &Config) -> anyhow::Result<()> {
        if verbose {
            tracing::info!(
                prompt = %self.prompt,
                workdir = %self.workdir,
                agents = %self.agents,
                claude_path = %config.agent.claude_path,
                "Starting flockwork run"
            );
        }

        println!("Flockwork Run");
        println!("===============");
        println!();
        println!("Prompt: {}", self.prompt);
        println!("Working directory: {}", self.workdir);
        println!("Agents: {}", self.agents);
        println!("Backend: {:?} ({})", config.agent.backend, config.agent.claude_path);
        println!();
        println!("Driving a single task through the orchestrator requires a plan file; use");
        println!("`flockwork worktree create` to stage a worktree for one, or wire a plan into");
        println!("flockwork_core::orchestrator::Coordinator directly for multi-task runs.");

        Ok(())
    }
}
