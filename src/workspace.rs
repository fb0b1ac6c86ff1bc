//! Per-task workspace directories.
//!
//! A workspace is the durable memory of a task: the invariant prompt written
//! once at submission, one raw log per completed iteration, and a rolling
//! summary the reasoning tool can re-read on its next invocation. The files
//! are append-only and outlive the in-memory task record.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

use crate::util::now_string;

/// File holding the invariant prompt, written once at submission.
pub const PROMPT_FILE: &str = "PROMPT.md";

/// Rolling append-only record of every iteration's output.
pub const SUMMARY_FILE: &str = "summary.log";

/// Validate a caller-supplied workspace id.
///
/// Only `[A-Za-z0-9_-]+` is accepted, which also rules out path traversal
/// and hidden directories.
pub fn validate_workspace_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("workspace_id must not be empty".to_string());
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(format!(
            "workspace_id '{}' contains characters outside [a-zA-Z0-9_-]",
            id
        ));
    }
    Ok(())
}

/// Create the workspace directory and persist the invariant prompt.
pub async fn prepare(root: &Path, id: &str, prompt: &str) -> Result<PathBuf> {
    let dir = root.join(id);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("create workspace {}", dir.display()))?;
    let prompt_path = dir.join(PROMPT_FILE);
    tokio::fs::write(&prompt_path, prompt)
        .await
        .with_context(|| format!("write {}", prompt_path.display()))?;
    Ok(dir)
}

/// Path of the raw log for a zero-based iteration index.
pub fn iteration_log_path(workspace: &Path, index: u32) -> PathBuf {
    workspace.join(format!("iter_{:03}.log", index))
}

/// Persist one iteration's raw output.
pub async fn write_iteration_log(workspace: &Path, index: u32, output: &str) -> Result<()> {
    let path = iteration_log_path(workspace, index);
    tokio::fs::write(&path, output)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Read one iteration's raw output.
pub async fn read_iteration_log(workspace: &Path, index: u32) -> std::io::Result<String> {
    tokio::fs::read_to_string(iteration_log_path(workspace, index)).await
}

/// Append a formatted block for one iteration to the rolling summary log.
pub async fn append_summary(workspace: &Path, index: u32, output: &str) -> Result<()> {
    let path = workspace.join(SUMMARY_FILE);
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .with_context(|| format!("open {}", path.display()))?;
    let block = format!(
        "===== iteration {:03} @ {} =====\n{}\n\n",
        index,
        now_string(),
        output.trim_end()
    );
    file.write_all(block.as_bytes())
        .await
        .with_context(|| format!("append {}", path.display()))?;
    // tokio files buffer internally; flush before the completion check so the
    // bytes are visible to the tool's next invocation and to log fetches.
    file.flush()
        .await
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn validate_accepts_restricted_charset() {
        assert!(validate_workspace_id("my-task").is_ok());
        assert!(validate_workspace_id("task_1").is_ok());
        assert!(validate_workspace_id("T123").is_ok());
    }

    #[test]
    fn validate_rejects_empty_and_traversal() {
        assert!(validate_workspace_id("").is_err());
        assert!(validate_workspace_id("..").is_err());
        assert!(validate_workspace_id("../etc").is_err());
        assert!(validate_workspace_id("a/b").is_err());
        assert!(validate_workspace_id("a\\b").is_err());
        assert!(validate_workspace_id("has space").is_err());
        assert!(validate_workspace_id(".hidden").is_err());
    }

    #[tokio::test]
    async fn prepare_creates_dir_and_prompt() {
        let root = TempDir::new().unwrap();
        let dir = prepare(root.path(), "t1", "build me a thing").await.unwrap();

        assert_eq!(dir, root.path().join("t1"));
        assert!(dir.is_dir());
        let prompt = std::fs::read_to_string(dir.join(PROMPT_FILE)).unwrap();
        assert_eq!(prompt, "build me a thing");
        // The prompt file is the only artifact before the first iteration.
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn iteration_logs_are_zero_padded_and_round_trip() {
        let root = TempDir::new().unwrap();
        let dir = prepare(root.path(), "t1", "prompt").await.unwrap();

        write_iteration_log(&dir, 0, "first output").await.unwrap();
        assert!(dir.join("iter_000.log").is_file());
        assert_eq!(read_iteration_log(&dir, 0).await.unwrap(), "first output");

        let err = read_iteration_log(&dir, 1).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn summary_accumulates_one_block_per_iteration() {
        let root = TempDir::new().unwrap();
        let dir = prepare(root.path(), "t1", "prompt").await.unwrap();

        append_summary(&dir, 0, "alpha\n").await.unwrap();
        append_summary(&dir, 1, "beta").await.unwrap();

        let summary = std::fs::read_to_string(dir.join(SUMMARY_FILE)).unwrap();
        assert_eq!(summary.matches("===== iteration").count(), 2);
        let alpha = summary.find("alpha").unwrap();
        let beta = summary.find("beta").unwrap();
        assert!(alpha < beta);
    }
}
