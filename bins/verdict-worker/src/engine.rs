/// Process Engine - Candidate Typechecker Execution
///
/// **Core Responsibility:**
/// Run a candidate command as a subprocess with a program on stdin and
/// capture its raw outputs.
///
/// **Critical Architectural Boundary:**
/// - Engine knows HOW to execute
/// - Engine does NOT judge the output (evaluator's job)
///
/// stdin is written from its own task while stdout/stderr are drained, so a
/// child that fills a pipe before reading all of its input cannot deadlock us.
use crate::error::{HarnessError, HarnessResult};
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Raw result of one subprocess run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Executes one fixed candidate command
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    command: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ProcessEngine {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            timeout: None,
        }
    }

    /// Kill the child and fail the task if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    #[tracing::instrument(skip(self, stdin_text), fields(command = %self.command))]
    pub async fn execute(&self, stdin_text: &str) -> HarnessResult<ProcessOutput> {
        execute(&self.command, &self.args, stdin_text, self.timeout).await
    }
}

/// Spawn `command`, feed it `stdin_text`, close stdin and collect everything
///
/// A missing exit code (child killed by a signal) is reported as 0.
pub async fn execute(
    command: &str,
    args: &[String],
    stdin_text: &str,
    timeout: Option<Duration>,
) -> HarnessResult<ProcessOutput> {
    let unavailable = |reason: String| HarnessError::ExecutorUnavailable {
        command: command.to_string(),
        reason,
    };

    let mut child = Command::new(command)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| unavailable(e.to_string()))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| unavailable("stdin was not captured".to_string()))?;

    let input = stdin_text.as_bytes().to_vec();
    let writer = tokio::spawn(async move {
        let written = stdin.write_all(&input).await;
        // Dropping the handle closes the pipe and signals end of input
        drop(stdin);
        written
    });

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| HarnessError::CommandTimeout {
                command: command.to_string(),
                timeout_ms: limit.as_millis() as u64,
            })??,
        None => child.wait_with_output().await?,
    };

    match writer.await {
        Ok(Err(e)) if e.kind() != ErrorKind::BrokenPipe => {
            warn!(command = %command, error = %e, "Failed to write program to stdin");
        }
        Err(e) => {
            warn!(command = %command, error = %e, "stdin writer task failed");
        }
        _ => {}
    }

    let exit_code = output.status.code().unwrap_or(0);
    debug!(command = %command, exit_code, "Process finished");

    Ok(ProcessOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ProcessEngine {
        ProcessEngine::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_stdin_is_delivered_and_closed() {
        let engine = ProcessEngine::new("cat", vec![]);
        let output = engine.execute("language core;\nfn main(n : Nat) -> Nat { return n }").await.unwrap();

        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout, "language core;\nfn main(n : Nat) -> Nat { return n }");
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_captures_both_streams_and_exit_code() {
        let output = sh("echo '[ERROR_MISSING_MAIN] no main'; echo oops >&2; exit 2")
            .execute("")
            .await
            .unwrap();

        assert_eq!(output.exit_code, 2);
        assert_eq!(output.stdout, "[ERROR_MISSING_MAIN] no main\n");
        assert_eq!(output.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_large_io_does_not_deadlock() {
        // Far larger than a pipe buffer in both directions
        let input = "x".repeat(1024 * 1024);
        let output = sh("cat; cat /dev/null >&2").execute(&input).await.unwrap();

        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout.len(), input.len());
    }

    #[tokio::test]
    async fn test_child_ignoring_stdin() {
        let input = "y".repeat(512 * 1024);
        let output = sh("exit 0").execute(&input).await.unwrap();
        assert_eq!(output.exit_code, 0);
    }

    #[tokio::test]
    async fn test_missing_executable_is_unavailable() {
        let engine = ProcessEngine::new("verdict-no-such-binary-7f3a", vec![]);
        let err = engine.execute("").await.unwrap_err();

        match err {
            HarnessError::ExecutorUnavailable { command, .. } => {
                assert_eq!(command, "verdict-no-such-binary-7f3a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let engine = sh("sleep 5").with_timeout(Some(Duration::from_millis(100)));
        let err = engine.execute("").await.unwrap_err();

        assert!(matches!(err, HarnessError::CommandTimeout { timeout_ms: 100, .. }));
    }

    #[tokio::test]
    async fn test_signal_exit_normalizes_to_zero() {
        let output = sh("kill -9 $$").execute("").await.unwrap();
        assert_eq!(output.exit_code, 0);
    }
}
