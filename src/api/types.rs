//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::registry::TaskStatus;

/// Request to submit a new task.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitTaskRequest {
    /// The invariant instruction text given to every iteration
    pub prompt: String,

    /// Optional loop bound (uses the configured default if not specified)
    pub max_iterations: Option<u32>,

    /// Optional completion token (uses the configured default if not specified)
    pub completion_promise: Option<String>,

    /// Optional caller-chosen workspace id, restricted to `[a-zA-Z0-9_-]+`
    pub workspace_id: Option<String>,
}

/// Response after submitting a task.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitTaskResponse {
    /// Unique task identifier
    pub task_id: String,

    /// Current task status (always `running` at submission)
    pub status: TaskStatus,

    /// The task's workspace directory
    pub workspace: String,
}

/// Acknowledgement for a cancellation request.
///
/// Cancellation is advisory and asynchronous; it takes effect at the next
/// iteration boundary.
#[derive(Debug, Clone, Serialize)]
pub struct CancelResponse {
    pub status: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Default loop bound applied when a submission omits `max_iterations`
    pub default_max_iterations: u32,
}
