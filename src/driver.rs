//! Iteration driver: the bounded per-task loop.
//!
//! One driver runs per task as its own tokio task and is the only writer of
//! that task's registry record. Every iteration re-sends the same original
//! prompt; the loop never accumulates conversation history. The workspace on
//! disk is the only state that grows between invocations.

use std::sync::Arc;

use tracing::{error, info};

use crate::registry::{Task, TaskOutcome, TaskRegistry};
use crate::runner::Invoker;
use crate::trace::TraceSink;
use crate::workspace;

/// Drive one task to a terminal state.
///
/// All faults are contained here: whatever happens inside the loop ends as a
/// terminal status on the task's record, never as a panic in the control
/// process.
pub async fn run(
    registry: Arc<TaskRegistry>,
    invoker: Arc<dyn Invoker>,
    sink: Arc<dyn TraceSink>,
    task: Task,
) {
    sink.task_started(&task.id, &task.prompt).await;

    let outcome = iterate(&registry, invoker.as_ref(), sink.as_ref(), &task).await;
    let status = outcome.status();

    registry.finish(&task.id, outcome).await;
    sink.task_finished(&task.id, status).await;
    info!(task = %task.id, status = ?status, "task finished");
}

/// Run iterations until one of the four stop conditions is reached.
///
/// Cancellation is cooperative: the token is observed only at the top of each
/// iteration, never while an invocation is in flight.
async fn iterate(
    registry: &TaskRegistry,
    invoker: &dyn Invoker,
    sink: &dyn TraceSink,
    task: &Task,
) -> TaskOutcome {
    for index in 0..task.max_iterations {
        if task.cancel.is_cancelled() {
            info!(task = %task.id, iteration = index, "cancellation observed, stopping");
            return TaskOutcome::Cancelled;
        }

        registry.record_iteration(&task.id, index + 1).await;

        let output = match invoker.invoke(&task.workspace, &task.prompt).await {
            Ok(output) => output,
            Err(e) => {
                error!(task = %task.id, iteration = index, "iteration failed: {}", e);
                return TaskOutcome::Error {
                    reason: e.to_string(),
                };
            }
        };

        // Both log writes must land before the completion check so any later
        // read of the workspace, including the tool's next invocation, sees
        // exactly this output.
        if let Err(e) = workspace::write_iteration_log(&task.workspace, index, &output).await {
            error!(task = %task.id, iteration = index, "failed to persist iteration log: {}", e);
            return TaskOutcome::Error {
                reason: format!("persist iteration {} log: {}", index, e),
            };
        }
        if let Err(e) = workspace::append_summary(&task.workspace, index, &output).await {
            error!(task = %task.id, iteration = index, "failed to append summary log: {}", e);
            return TaskOutcome::Error {
                reason: format!("append summary log: {}", e),
            };
        }

        sink.iteration_finished(&task.id, index, &output).await;

        if output.contains(&task.completion_token) {
            info!(task = %task.id, iteration = index, "completion token observed");
            return TaskOutcome::Complete {
                final_output: output,
            };
        }
    }

    TaskOutcome::MaxIterationsReached
}
