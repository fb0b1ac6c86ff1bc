//! Configuration management for taskloop.
//!
//! Configuration can be set via environment variables:
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `WORKSPACES_ROOT` - Optional. Root directory for per-task workspaces. Defaults to `workspaces`.
//! - `MAX_ITERATIONS` - Optional. Default loop bound per task. Defaults to `10`.
//! - `COMPLETION_PROMISE` - Optional. Default completion token. Defaults to `TASK COMPLETE`.
//! - `ITERATION_TIMEOUT_SECS` - Optional. Wall-clock timeout per tool invocation. Defaults to `600`.
//! - `AGENT_CLI_PATH` - Optional. The reasoning-tool binary. Defaults to `claude`.
//! - `LANGFUSE_PUBLIC_KEY` - Optional. Trace sink public credential.
//! - `LANGFUSE_SECRET_KEY` - Optional. Trace sink secret credential.
//! - `LANGFUSE_HOST` - Optional. Trace sink base URL. Defaults to `https://cloud.langfuse.com`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Trace sink configuration.
///
/// Tracing is enabled only when both credentials are present; otherwise a
/// no-op sink is installed and task outcomes are unaffected.
#[derive(Debug, Clone)]
pub struct LangfuseConfig {
    /// Public API key
    pub public_key: Option<String>,

    /// Secret API key
    pub secret_key: Option<String>,

    /// Base URL of the ingestion host
    pub host: String,
}

impl Default for LangfuseConfig {
    fn default() -> Self {
        Self {
            public_key: None,
            secret_key: None,
            host: "https://cloud.langfuse.com".to_string(),
        }
    }
}

impl LangfuseConfig {
    /// Check if the trace sink is enabled (both credentials configured)
    pub fn is_enabled(&self) -> bool {
        self.public_key.is_some() && self.secret_key.is_some()
    }
}

/// Control-process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Root directory under which each task's workspace is created
    pub workspaces_root: PathBuf,

    /// Default maximum iterations per task
    pub default_max_iterations: u32,

    /// Default completion token looked for in iteration output
    pub default_completion_token: String,

    /// Wall-clock timeout for a single tool invocation, in seconds
    pub iteration_timeout_secs: u64,

    /// Path to the reasoning-tool CLI
    pub agent_cli_path: String,

    /// Trace sink configuration
    pub langfuse: LangfuseConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` when a numeric variable fails to
    /// parse or `MAX_ITERATIONS` is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let workspaces_root = std::env::var("WORKSPACES_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("workspaces"));

        let default_max_iterations: u32 = std::env::var("MAX_ITERATIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("MAX_ITERATIONS".to_string(), format!("{}", e))
            })?;
        if default_max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be positive".to_string(),
            ));
        }

        let default_completion_token =
            std::env::var("COMPLETION_PROMISE").unwrap_or_else(|_| "TASK COMPLETE".to_string());

        let iteration_timeout_secs = std::env::var("ITERATION_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("ITERATION_TIMEOUT_SECS".to_string(), format!("{}", e))
            })?;

        let agent_cli_path =
            std::env::var("AGENT_CLI_PATH").unwrap_or_else(|_| "claude".to_string());

        let langfuse = LangfuseConfig {
            public_key: std::env::var("LANGFUSE_PUBLIC_KEY").ok(),
            secret_key: std::env::var("LANGFUSE_SECRET_KEY").ok(),
            host: std::env::var("LANGFUSE_HOST")
                .unwrap_or_else(|_| "https://cloud.langfuse.com".to_string()),
        };

        Ok(Self {
            host,
            port,
            workspaces_root,
            default_max_iterations,
            default_completion_token,
            iteration_timeout_secs,
            agent_cli_path,
            langfuse,
        })
    }
}
