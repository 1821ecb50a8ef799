use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::process::Command;

use crate::config::AgentConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Completed,
    Failed,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of job execution
#[derive(Debug)]
pub struct ExecutionResult {
    pub job_id: String,
    pub status: ExecutionStatus,
    pub exit_code: Option<i32>,
    pub output: Option<String>,
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Base64 of captured stdout, as carried in the `data` parameter of a
    /// `jobresult` event. Empty output encodes to an empty string.
    pub fn encoded_output(&self) -> String {
        STANDARD.encode(self.output.as_deref().unwrap_or_default())
    }
}

/// Runs job commands on behalf of the node loop.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, job_id: &str, command: &str) -> ExecutionResult;
}

/// Executes commands with `sh -c` directly on the host.
///
/// There is no sandbox: a command runs with the node process's privileges.
#[derive(Debug, Clone)]
pub struct JobExecutor {
    shell: String,
    timeout: Option<Duration>,
}

impl Default for JobExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl JobExecutor {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
            timeout: None,
        }
    }

    /// Executor honoring the node's configured job timeout.
    pub fn from_config(config: &AgentConfig) -> Self {
        Self {
            timeout: config.job_timeout,
            ..Self::new()
        }
    }

    /// Kill commands still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn run(&self, job_id: &str, command: &str) -> ExecutionResult {
        tracing::info!(job_id, command, "Executing job");

        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(job_id, timeout_secs = limit.as_secs(), "Job timed out");
                    return ExecutionResult {
                        job_id: job_id.to_string(),
                        status: ExecutionStatus::Failed,
                        exit_code: None,
                        output: None,
                        error: Some(format!("timed out after {:?}", limit)),
                    };
                }
            },
            None => child.await,
        };

        Self::process_output(job_id, result)
    }

    fn process_output(
        job_id: &str,
        result: Result<std::process::Output, std::io::Error>,
    ) -> ExecutionResult {
        match result {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                let exit_code = output.status.code();

                let (status, error) = if output.status.success() {
                    (ExecutionStatus::Completed, None)
                } else {
                    (
                        ExecutionStatus::Failed,
                        Some(if stderr.is_empty() {
                            format!("Exit code: {:?}", exit_code)
                        } else {
                            stderr
                        }),
                    )
                };

                tracing::info!(job_id, %status, exit_code = ?exit_code, "Job finished");

                ExecutionResult {
                    job_id: job_id.to_string(),
                    status,
                    exit_code,
                    output: if stdout.is_empty() { None } else { Some(stdout) },
                    error,
                }
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Job execution failed");
                ExecutionResult {
                    job_id: job_id.to_string(),
                    status: ExecutionStatus::Failed,
                    exit_code: None,
                    output: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[async_trait]
impl CommandExecutor for JobExecutor {
    async fn execute(&self, job_id: &str, command: &str) -> ExecutionResult {
        self.run(job_id, command).await
    }
}
