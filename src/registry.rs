//! In-memory task registry (non-persistent).
//!
//! The single source of truth for task status queries. Each record is mutated
//! only by its own iteration driver; HTTP handlers take read snapshots. The
//! registry does not survive a process restart; the on-disk workspace does.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::util::now_string;

/// Task status enumeration.
///
/// `Running` is the only non-terminal status; every other status is absorbing.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// The iteration driver is working on the task
    Running,
    /// An iteration's output contained the completion token
    Complete,
    /// The loop bound was exhausted without the completion token appearing
    MaxIterationsReached,
    /// A cancellation request took effect at an iteration boundary
    Cancelled,
    /// A runner or filesystem fault terminated the task
    Error,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Running)
    }
}

/// Terminal outcome reported by the iteration driver.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Complete { final_output: String },
    MaxIterationsReached,
    Cancelled,
    Error { reason: String },
}

impl TaskOutcome {
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskOutcome::Complete { .. } => TaskStatus::Complete,
            TaskOutcome::MaxIterationsReached => TaskStatus::MaxIterationsReached,
            TaskOutcome::Cancelled => TaskStatus::Cancelled,
            TaskOutcome::Error { .. } => TaskStatus::Error,
        }
    }
}

/// Full task record.
///
/// Serialized as the poll response; the cancellation token is internal and
/// never leaves the process.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    /// Unique task identifier, also the workspace directory name
    pub id: String,

    /// Workspace directory exclusively owned by this task
    pub workspace: PathBuf,

    /// The invariant instruction text given to every iteration
    pub prompt: String,

    /// Loop bound
    pub max_iterations: u32,

    /// Literal substring whose presence in iteration output ends the loop
    pub completion_token: String,

    /// Current status
    pub status: TaskStatus,

    /// Count of iterations started so far; never exceeds `max_iterations`
    pub iterations_run: u32,

    /// Raw output of the completing iteration, set only on `complete`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_output: Option<String>,

    /// Recorded fault, set only on `error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    /// Submission time (RFC 3339)
    pub started_at: String,

    /// Terminal-transition time (RFC 3339); unset while running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,

    /// Cooperative cancellation signal, observed only between iterations
    #[serde(skip)]
    pub cancel: CancellationToken,
}

impl Task {
    pub fn new(
        id: String,
        workspace: PathBuf,
        prompt: String,
        max_iterations: u32,
        completion_token: String,
    ) -> Self {
        Self {
            id,
            workspace,
            prompt,
            max_iterations,
            completion_token,
            status: TaskStatus::Running,
            iterations_run: 0,
            final_output: None,
            failure_reason: None,
            started_at: now_string(),
            finished_at: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// Lightweight entry for task listings.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub status: TaskStatus,
    pub iterations_run: u32,
    pub started_at: String,
}

/// Errors surfaced by registry operations.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Task {0} not found")]
    NotFound(String),

    #[error("Task {0} is already running")]
    AlreadyRunning(String),

    #[error("Task {0} is not running")]
    NotRunning(String),
}

/// Concurrent map from task id to task record.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new task.
    ///
    /// A terminal record under the same id is replaced: deliberate
    /// resubmission reusing a workspace inherits its on-disk progress. A
    /// record that is still running is a conflict.
    pub async fn create(&self, task: Task) -> Result<(), RegistryError> {
        let mut tasks = self.tasks.write().await;
        if let Some(existing) = tasks.get(&task.id) {
            if existing.status == TaskStatus::Running {
                return Err(RegistryError::AlreadyRunning(task.id.clone()));
            }
        }
        tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Current snapshot of a task's record.
    pub async fn snapshot(&self, id: &str) -> Option<Task> {
        self.tasks.read().await.get(id).cloned()
    }

    /// Summaries of every known task, most recent first.
    pub async fn list(&self) -> Vec<TaskSummary> {
        let tasks = self.tasks.read().await;
        let mut entries: Vec<TaskSummary> = tasks
            .values()
            .map(|t| TaskSummary {
                id: t.id.clone(),
                status: t.status,
                iterations_run: t.iterations_run,
                started_at: t.started_at.clone(),
            })
            .collect();
        entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        entries
    }

    /// Flag a running task for cooperative cancellation.
    ///
    /// The request is advisory: it arms the task's token, which the driver
    /// observes at the next iteration boundary.
    pub async fn request_cancel(&self, id: &str) -> Result<(), RegistryError> {
        let tasks = self.tasks.read().await;
        let task = tasks
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        if task.status != TaskStatus::Running {
            return Err(RegistryError::NotRunning(id.to_string()));
        }
        task.cancel.cancel();
        Ok(())
    }

    /// Record that the task has started its `n`-th iteration (1-based count).
    pub async fn record_iteration(&self, id: &str, n: u32) {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(id) {
            if task.status == TaskStatus::Running {
                task.iterations_run = n;
            }
        }
    }

    /// Move a task into its terminal state.
    ///
    /// A record that is already terminal is left untouched, keeping status
    /// transitions monotonic.
    pub async fn finish(&self, id: &str, outcome: TaskOutcome) {
        let mut tasks = self.tasks.write().await;
        let Some(task) = tasks.get_mut(id) else {
            return;
        };
        if task.status.is_terminal() {
            return;
        }
        match outcome {
            TaskOutcome::Complete { final_output } => {
                task.status = TaskStatus::Complete;
                task.final_output = Some(final_output);
            }
            TaskOutcome::MaxIterationsReached => {
                task.status = TaskStatus::MaxIterationsReached;
            }
            TaskOutcome::Cancelled => {
                task.status = TaskStatus::Cancelled;
            }
            TaskOutcome::Error { reason } => {
                task.status = TaskStatus::Error;
                task.failure_reason = Some(reason);
            }
        }
        task.finished_at = Some(now_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn task(id: &str) -> Task {
        Task::new(
            id.to_string(),
            PathBuf::from("/tmp/ws").join(id),
            "do the thing".to_string(),
            3,
            "DONE".to_string(),
        )
    }

    #[tokio::test]
    async fn create_conflicts_while_running() {
        let registry = TaskRegistry::new();
        registry.create(task("t1")).await.unwrap();

        let err = registry.create(task("t1")).await.unwrap_err();
        assert_eq!(err, RegistryError::AlreadyRunning("t1".to_string()));
    }

    #[tokio::test]
    async fn create_replaces_terminal_record() {
        let registry = TaskRegistry::new();
        registry.create(task("t1")).await.unwrap();
        registry
            .finish("t1", TaskOutcome::MaxIterationsReached)
            .await;

        registry.create(task("t1")).await.unwrap();
        let snap = registry.snapshot("t1").await.unwrap();
        assert_eq!(snap.status, TaskStatus::Running);
        assert_eq!(snap.iterations_run, 0);
    }

    #[tokio::test]
    async fn cancel_requires_running_task() {
        let registry = TaskRegistry::new();
        assert_eq!(
            registry.request_cancel("missing").await.unwrap_err(),
            RegistryError::NotFound("missing".to_string())
        );

        registry.create(task("t1")).await.unwrap();
        registry.request_cancel("t1").await.unwrap();
        let snap = registry.snapshot("t1").await.unwrap();
        assert!(snap.cancel.is_cancelled());

        registry
            .finish(
                "t1",
                TaskOutcome::Cancelled,
            )
            .await;
        assert_eq!(
            registry.request_cancel("t1").await.unwrap_err(),
            RegistryError::NotRunning("t1".to_string())
        );
    }

    #[tokio::test]
    async fn terminal_status_is_absorbing() {
        let registry = TaskRegistry::new();
        registry.create(task("t1")).await.unwrap();
        registry
            .finish(
                "t1",
                TaskOutcome::Complete {
                    final_output: "all DONE".to_string(),
                },
            )
            .await;

        // A late fault report must not overwrite the terminal state.
        registry
            .finish(
                "t1",
                TaskOutcome::Error {
                    reason: "too late".to_string(),
                },
            )
            .await;
        registry.record_iteration("t1", 9).await;

        let snap = registry.snapshot("t1").await.unwrap();
        assert_eq!(snap.status, TaskStatus::Complete);
        assert_eq!(snap.final_output.as_deref(), Some("all DONE"));
        assert!(snap.failure_reason.is_none());
        assert_eq!(snap.iterations_run, 0);
        assert!(snap.finished_at.is_some());
    }
}
