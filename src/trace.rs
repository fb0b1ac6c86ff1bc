//! Optional tracing collaborator.
//!
//! The driver reports one trace per task and one span per iteration through
//! the `TraceSink` capability. When no credentials are configured the no-op
//! sink is installed, so the loop body is identical with and without
//! observability. Sink failures are logged and swallowed; they never affect
//! a task's outcome.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::LangfuseConfig;
use crate::registry::TaskStatus;
use crate::util::now_string;

/// Observability capability used by the iteration driver.
#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn task_started(&self, task_id: &str, prompt: &str);
    async fn iteration_finished(&self, task_id: &str, index: u32, output: &str);
    async fn task_finished(&self, task_id: &str, status: TaskStatus);
}

/// Sink used when no tracing credentials are configured.
pub struct NoopTraceSink;

#[async_trait]
impl TraceSink for NoopTraceSink {
    async fn task_started(&self, _task_id: &str, _prompt: &str) {}
    async fn iteration_finished(&self, _task_id: &str, _index: u32, _output: &str) {}
    async fn task_finished(&self, _task_id: &str, _status: TaskStatus) {}
}

/// Langfuse-compatible ingestion sink.
///
/// Posts batch events to `{host}/api/public/ingestion` with basic auth
/// (public key as username, secret key as password).
pub struct LangfuseTraceSink {
    client: reqwest::Client,
    host: String,
    public_key: String,
    secret_key: String,
}

impl LangfuseTraceSink {
    pub fn new(host: String, public_key: String, secret_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            host,
            public_key,
            secret_key,
        }
    }

    /// Build the sink from configuration, if both credentials are present.
    pub fn from_config(config: &LangfuseConfig) -> Option<Self> {
        match (&config.public_key, &config.secret_key) {
            (Some(public_key), Some(secret_key)) => Some(Self::new(
                config.host.clone(),
                public_key.clone(),
                secret_key.clone(),
            )),
            _ => None,
        }
    }

    async fn ingest(&self, event_type: &str, body: serde_json::Value) {
        let event = json!({
            "id": Uuid::new_v4().to_string(),
            "type": event_type,
            "timestamp": now_string(),
            "body": body,
        });
        let result = self
            .client
            .post(format!("{}/api/public/ingestion", self.host))
            .basic_auth(&self.public_key, Some(&self.secret_key))
            .json(&json!({ "batch": [event] }))
            .send()
            .await;
        match result {
            Ok(resp) if !resp.status().is_success() => {
                warn!("trace ingestion rejected: {}", resp.status());
            }
            Ok(_) => debug!("trace event {} delivered", event_type),
            Err(e) => warn!("trace ingestion failed: {}", e),
        }
    }
}

#[async_trait]
impl TraceSink for LangfuseTraceSink {
    async fn task_started(&self, task_id: &str, prompt: &str) {
        self.ingest(
            "trace-create",
            json!({
                "id": task_id,
                "name": "taskloop-task",
                "timestamp": now_string(),
                "input": prompt,
            }),
        )
        .await;
    }

    async fn iteration_finished(&self, task_id: &str, index: u32, output: &str) {
        self.ingest(
            "span-create",
            json!({
                "id": Uuid::new_v4().to_string(),
                "traceId": task_id,
                "name": format!("iteration-{:03}", index),
                "endTime": now_string(),
                "output": output,
            }),
        )
        .await;
    }

    async fn task_finished(&self, task_id: &str, status: TaskStatus) {
        // Trace upsert: same id, terminal status as output.
        self.ingest(
            "trace-create",
            json!({
                "id": task_id,
                "output": status,
            }),
        )
        .await;
    }
}
