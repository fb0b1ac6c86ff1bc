//! Subprocess runner for the external reasoning tool.
//!
//! Every iteration launches one fresh one-shot process with the task's
//! workspace as its working directory, delivers the prompt on stdin, and
//! collects stdout and stderr into a single text result. The process inherits
//! the host environment so the tool can reach its own integrations; a
//! wall-clock timeout bounds each invocation.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// Faults a single invocation can produce.
///
/// A non-zero exit status is not a fault: the tool may exit unhappily and
/// still have produced usable output. Only the completion token matters.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("failed to spawn reasoning tool '{path}': {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("reasoning tool exceeded the {secs}s iteration timeout")]
    Timeout { secs: u64 },

    #[error("i/o failure while collecting reasoning tool output: {0}")]
    Io(#[from] std::io::Error),
}

/// Seam between the iteration driver and the subprocess layer.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Run one tool invocation in `workspace` and return its combined output.
    async fn invoke(&self, workspace: &Path, prompt: &str) -> Result<String, RunnerError>;
}

/// Production invoker that shells out to the reasoning CLI.
#[derive(Debug, Clone)]
pub struct CliInvoker {
    cli_path: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CliInvoker {
    pub fn new(cli_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            cli_path: cli_path.into(),
            // One-shot mode: read the prompt from stdin, print the result, exit.
            args: vec!["--print".to_string()],
            timeout,
        }
    }

    /// Override the fixed CLI arguments.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

#[async_trait]
impl Invoker for CliInvoker {
    async fn invoke(&self, workspace: &Path, prompt: &str) -> Result<String, RunnerError> {
        let mut child = Command::new(&self.cli_path)
            .args(&self.args)
            .current_dir(workspace)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RunnerError::Spawn {
                path: self.cli_path.clone(),
                source: e,
            })?;

        let stdin_pipe = child.stdin.take();
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let prompt = prompt.to_string();

        // Feed stdin and drain both output pipes concurrently with the child's
        // exit so no pipe can fill up and stall the process.
        let io_fut = async {
            let stdin_fut = async move {
                if let Some(mut stdin) = stdin_pipe {
                    if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                        // The tool may legitimately exit without reading input.
                        warn!("failed to write prompt to reasoning tool stdin: {}", e);
                    }
                    // stdin drops here, closing the pipe so a one-shot
                    // invocation knows the input is complete.
                }
                Ok::<_, std::io::Error>(())
            };
            let stdout_fut = async {
                let mut buf = Vec::new();
                if let Some(pipe) = stdout_pipe.as_mut() {
                    pipe.read_to_end(&mut buf).await?;
                }
                Ok::<_, std::io::Error>(buf)
            };
            let stderr_fut = async {
                let mut buf = Vec::new();
                if let Some(pipe) = stderr_pipe.as_mut() {
                    pipe.read_to_end(&mut buf).await?;
                }
                Ok::<_, std::io::Error>(buf)
            };
            let (_, stdout_buf, stderr_buf, status) =
                tokio::try_join!(stdin_fut, stdout_fut, stderr_fut, child.wait())?;
            Ok::<_, std::io::Error>((status, stdout_buf, stderr_buf))
        };

        let result = tokio::time::timeout(self.timeout, io_fut).await;
        match result {
            Ok(Ok((status, stdout_buf, stderr_buf))) => {
                if !status.success() {
                    warn!("reasoning tool exited with status: {}", status);
                }
                let mut combined = String::from_utf8_lossy(&stdout_buf).into_owned();
                combined.push_str(&String::from_utf8_lossy(&stderr_buf));
                debug!(
                    bytes = combined.len(),
                    "reasoning tool invocation finished"
                );
                Ok(combined)
            }
            Ok(Err(e)) => Err(RunnerError::Io(e)),
            Err(_) => {
                warn!(
                    "reasoning tool exceeded {}s timeout, killing",
                    self.timeout.as_secs()
                );
                if let Err(e) = child.start_kill() {
                    warn!("failed to kill timed-out reasoning tool: {}", e);
                }
                let _ = child.wait().await;
                Err(RunnerError::Timeout {
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str, timeout: Duration) -> CliInvoker {
        CliInvoker::new("/bin/sh", timeout)
            .with_args(vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn combines_stdout_and_stderr() {
        let dir = TempDir::new().unwrap();
        let invoker = sh("echo out; echo err >&2", Duration::from_secs(5));

        let output = invoker.invoke(dir.path(), "ignored").await.unwrap();
        assert!(output.contains("out"));
        assert!(output.contains("err"));
    }

    #[tokio::test]
    async fn delivers_prompt_on_stdin() {
        let dir = TempDir::new().unwrap();
        let invoker = sh("cat", Duration::from_secs(5));

        let output = invoker.invoke(dir.path(), "the prompt text").await.unwrap();
        assert_eq!(output, "the prompt text");
    }

    #[tokio::test]
    async fn runs_in_the_given_working_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "present").unwrap();
        let invoker = sh("cat marker.txt", Duration::from_secs(5));

        let output = invoker.invoke(dir.path(), "").await.unwrap();
        assert_eq!(output, "present");
    }

    #[tokio::test]
    async fn nonzero_exit_is_not_a_fault() {
        let dir = TempDir::new().unwrap();
        let invoker = sh("echo partial; exit 3", Duration::from_secs(5));

        let output = invoker.invoke(dir.path(), "").await.unwrap();
        assert!(output.contains("partial"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_fault() {
        let dir = TempDir::new().unwrap();
        let invoker = CliInvoker::new("/no/such/binary", Duration::from_secs(5));

        let err = invoker.invoke(dir.path(), "prompt").await.unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
    }

    #[tokio::test]
    async fn slow_tool_is_killed_at_the_timeout() {
        let dir = TempDir::new().unwrap();
        let invoker = sh("sleep 30", Duration::from_millis(200));

        let start = std::time::Instant::now();
        let err = invoker.invoke(dir.path(), "").await.unwrap_err();
        assert!(matches!(err, RunnerError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
