//! HTTP route handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::Config;
use crate::driver;
use crate::registry::{RegistryError, Task, TaskOutcome, TaskRegistry, TaskSummary};
use crate::runner::{CliInvoker, Invoker};
use crate::trace::{LangfuseTraceSink, NoopTraceSink, TraceSink};
use crate::workspace;

use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub registry: Arc<TaskRegistry>,
    pub invoker: Arc<dyn Invoker>,
    pub sink: Arc<dyn TraceSink>,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let invoker: Arc<dyn Invoker> = Arc::new(CliInvoker::new(
        config.agent_cli_path.clone(),
        Duration::from_secs(config.iteration_timeout_secs),
    ));

    // The sink is chosen once at startup; the driver never branches on
    // whether tracing is configured.
    let sink: Arc<dyn TraceSink> = match LangfuseTraceSink::from_config(&config.langfuse) {
        Some(sink) => {
            tracing::info!("Trace sink enabled ({})", config.langfuse.host);
            Arc::new(sink)
        }
        None => {
            tracing::info!("Trace sink disabled (no credentials configured)");
            Arc::new(NoopTraceSink)
        }
    };

    let state = Arc::new(AppState {
        config: config.clone(),
        registry: Arc::new(TaskRegistry::new()),
        invoker,
        sink,
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/tasks", post(submit_task))
        .route("/tasks", get(list_tasks))
        .route("/tasks/:id", get(get_task))
        .route("/tasks/:id", delete(cancel_task))
        .route("/tasks/:id/logs/:iter", get(get_iteration_log))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for a shutdown signal.
///
/// Running drivers are dropped with the process; their workspaces keep the
/// persisted evidence, the in-memory registry does not survive.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        default_max_iterations: state.config.default_max_iterations,
    })
}

/// Submit a new task.
///
/// Returns immediately with `202`; the iteration driver runs in the
/// background and progress is observed by polling.
async fn submit_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubmitTaskRequest>,
) -> Result<(StatusCode, Json<SubmitTaskResponse>), (StatusCode, String)> {
    if req.prompt.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "prompt must not be empty".to_string()));
    }

    let id = match req.workspace_id {
        Some(id) => {
            workspace::validate_workspace_id(&id).map_err(|e| (StatusCode::BAD_REQUEST, e))?;
            id
        }
        None => Uuid::new_v4().to_string(),
    };

    let max_iterations = req
        .max_iterations
        .unwrap_or(state.config.default_max_iterations);
    if max_iterations == 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "max_iterations must be positive".to_string(),
        ));
    }
    let completion_token = req
        .completion_promise
        .unwrap_or_else(|| state.config.default_completion_token.clone());

    let task = Task::new(
        id.clone(),
        state.config.workspaces_root.join(&id),
        req.prompt.clone(),
        max_iterations,
        completion_token,
    );

    // Claim the registry entry first: the conflict check must happen before
    // anything touches a workspace another running task may own.
    state.registry.create(task.clone()).await.map_err(|e| match e {
        RegistryError::AlreadyRunning(_) => (StatusCode::CONFLICT, e.to_string()),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    })?;

    let dir = match workspace::prepare(&state.config.workspaces_root, &id, &req.prompt).await {
        Ok(dir) => dir,
        Err(e) => {
            let reason = format!("prepare workspace: {}", e);
            state
                .registry
                .finish(
                    &id,
                    TaskOutcome::Error {
                        reason: reason.clone(),
                    },
                )
                .await;
            return Err((StatusCode::INTERNAL_SERVER_ERROR, reason));
        }
    };

    tracing::info!(task = %id, workspace = %dir.display(), "task submitted");

    // Run the iteration driver without blocking the caller.
    tokio::spawn(driver::run(
        Arc::clone(&state.registry),
        Arc::clone(&state.invoker),
        Arc::clone(&state.sink),
        task,
    ));

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitTaskResponse {
            task_id: id,
            status: crate::registry::TaskStatus::Running,
            workspace: dir.display().to_string(),
        }),
    ))
}

/// Poll a task snapshot.
async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Task>, (StatusCode, String)> {
    state
        .registry
        .snapshot(&id)
        .await
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Task {} not found", id)))
}

/// List all tasks.
async fn list_tasks(State(state): State<Arc<AppState>>) -> Json<Vec<TaskSummary>> {
    Json(state.registry.list().await)
}

/// Request cancellation of a running task.
async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, (StatusCode, String)> {
    match state.registry.request_cancel(&id).await {
        Ok(()) => Ok(Json(CancelResponse {
            status: "cancelling".to_string(),
        })),
        Err(e @ RegistryError::NotFound(_)) => Err((StatusCode::NOT_FOUND, e.to_string())),
        Err(e) => Err((StatusCode::CONFLICT, e.to_string())),
    }
}

/// Fetch the raw log of one completed iteration.
async fn get_iteration_log(
    State(state): State<Arc<AppState>>,
    Path((id, iter)): Path<(String, u32)>,
) -> Result<String, (StatusCode, String)> {
    let task = state
        .registry
        .snapshot(&id)
        .await
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Task {} not found", id)))?;

    match workspace::read_iteration_log(&task.workspace, iter).await {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err((
            StatusCode::NOT_FOUND,
            format!("no log for iteration {} of task {}", iter, id),
        )),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
