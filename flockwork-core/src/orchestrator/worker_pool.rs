//! WorkerPool (C2): the `Orchestrator` collaborator contract (§6).
//!
//! Worker process launch and stdout/stderr capture are explicitly out of
//! scope for the core (§1); this module specifies only the contract the
//! core consumes, plus one concrete implementation (`LocalWorkerPool`)
//! grounded in `agent::AgentSpawner` so the crate has a real, runnable
//! worker pool rather than only a trait.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::agent::AgentSpawner;
use crate::plan::Task;
use crate::{Error, Result};

/// Status of one worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// A running or finished worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub worktree_path: PathBuf,
    pub branch: String,
    pub status: InstanceStatus,
    pub files_modified: Vec<String>,
}

/// A worker completion notice, as delivered on the completion channel.
#[derive(Debug, Clone)]
pub struct Completion {
    pub instance_id: String,
    pub task_id: Option<String>,
    pub success: bool,
    pub needs_retry: bool,
}

/// The source-tree view a worker operates against: a worktree bound to a
/// branch derived from some base. Produced by a `Checkout` collaborator.
#[derive(Debug, Clone)]
pub struct WorkerView {
    pub path: PathBuf,
    pub branch: String,
    pub base_branch: String,
}

/// `Orchestrator` collaborator: launches worker processes against
/// isolated source-tree views and reports their completions.
#[async_trait]
pub trait WorkerPool: Send + Sync {
    async fn add_instance(&self, task: &Task, view: &WorkerView, prompt: &str) -> Result<Instance>;
    async fn start_instance(&self, id: &str) -> Result<()>;
    /// Best-effort and idempotent: stopping an already-stopped or unknown
    /// instance is not an error.
    async fn stop_instance(&self, id: &str) -> Result<()>;
    fn get_instance(&self, id: &str) -> Option<Instance>;
    /// Recovers completions that channel-based monitoring may have
    /// missed. Treated as idempotent against completions already
    /// delivered through the channel (§9 open question, decided): callers
    /// de-duplicate on task ID.
    async fn poll_task_completions(&self) -> Vec<Completion>;
}

/// A `WorkerPool` backed by real `claude` subprocesses via
/// `AgentSpawner`, with an in-memory instance table and a completion
/// channel fed by a background reader per instance.
pub struct LocalWorkerPool {
    spawner: AgentSpawner,
    instances: Mutex<HashMap<String, Instance>>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: Mutex<mpsc::UnboundedReceiver<Completion>>,
}

impl LocalWorkerPool {
    pub fn new(spawner: AgentSpawner) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            spawner,
            instances: Mutex::new(HashMap::new()),
            completions_tx: tx,
            completions_rx: Mutex::new(rx),
        }
    }

    fn instances(&self) -> std::sync::MutexGuard<'_, HashMap<String, Instance>> {
        self.instances.lock().expect("worker pool mutex poisoned")
    }

    /// Drains completions already pushed onto the channel without
    /// blocking; used by `poll_task_completions`.
    fn drain_channel(&self) -> Vec<Completion> {
        let mut rx = self.completions_rx.lock().expect("completion channel mutex poisoned");
        let mut out = Vec::new();
        while let Ok(c) = rx.try_recv() {
            out.push(c);
        }
        out
    }
}

#[async_trait]
impl WorkerPool for LocalWorkerPool {
    async fn add_instance(&self, task: &Task, view: &WorkerView, prompt: &str) -> Result<Instance> {
        let id = uuid::Uuid::new_v4().to_string();
        let instance = Instance {
            id: id.clone(),
            worktree_path: view.path.clone(),
            branch: view.branch.clone(),
            status: InstanceStatus::Pending,
            files_modified: Vec::new(),
        };
        self.instances().insert(id.clone(), instance.clone());

        let mut handle = self.spawner.spawn(prompt, &view.path).await.map_err(|e| {
            Error::TransientWorkerFailure {
                task_id: task.id.clone(),
                reason: e.to_string(),
            }
        })?;

        if let Some(inst) = self.instances().get_mut(&id) {
            inst.status = InstanceStatus::Running;
        }

        let tx = self.completions_tx.clone();
        let task_id = task.id.clone();
        let instance_id = id.clone();
        tokio::spawn(async move {
            let status = handle.wait().await;
            let success = matches!(status, Ok(s) if s.success());
            let _ = tx.send(Completion {
                instance_id,
                task_id: Some(task_id),
                success,
                needs_retry: !success,
            });
        });

        Ok(instance)
    }

    async fn start_instance(&self, _id: &str) -> Result<()> {
        // `add_instance` spawns immediately; nothing further to start.
        Ok(())
    }

    async fn stop_instance(&self, id: &str) -> Result<()> {
        if let Some(inst) = self.instances().get_mut(id) {
            inst.status = InstanceStatus::Failed;
        }
        Ok(())
    }

    fn get_instance(&self, id: &str) -> Option<Instance> {
        self.instances().get(id).cloned()
    }

    async fn poll_task_completions(&self) -> Vec<Completion> {
        self.drain_channel()
    }
}
