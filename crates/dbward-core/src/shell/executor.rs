use super::process::ProcessGroupGuard;
use super::redaction::redact;
use crate::error::ShellError;
use crate::logging::{CommandHandle, CommandUpdate, OperationLogger};
use crate::sanitization::ContentSanitizer;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Upper bound on the output recorded in a command log entry; the tail is kept
pub const MAX_LOGGED_OUTPUT: usize = 64 * 1024;

/// Runs single command lines through `sh -c` with audit logging.
///
/// Every run produces one two-phase entry on the supplied logger: the
/// redacted command when it starts, then the redacted combined output, exit
/// code and duration when it ends (success, failure or timeout alike).
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }

    /// Use a different POSIX shell binary
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// Run `command` to completion and return its stdout.
    ///
    /// Fails with [`ShellError::ExecutionFailed`] carrying redacted stderr on
    /// a non-zero exit.
    pub async fn execute(
        &self,
        command: &str,
        logger: &dyn OperationLogger,
    ) -> Result<String, ShellError> {
        self.run(command, None, logger).await
    }

    /// Like [`execute`](Self::execute), but kills the whole process group and
    /// returns [`ShellError::TimedOut`] once `timeout` elapses.
    pub async fn execute_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
        logger: &dyn OperationLogger,
    ) -> Result<String, ShellError> {
        self.run(command, Some(timeout), logger).await
    }

    async fn run(
        &self,
        command: &str,
        timeout: Option<Duration>,
        logger: &dyn OperationLogger,
    ) -> Result<String, ShellError> {
        let redacted = redact(command);
        let handle = logger.start_command(&redacted);
        let started = Instant::now();
        tracing::debug!(command = %redacted, "Executing shell command");

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                finish(logger, handle, redact(&e.to_string()), None, started);
                return Err(ShellError::Spawn(e));
            }
        };
        let guard = ProcessGroupGuard::new(child.id());

        let waited = match timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    // Dropping the wait future dropped the child; the guard takes its children
                    drop(guard);
                    let timeout_ms = limit.as_millis() as u64;
                    finish(
                        logger,
                        handle,
                        format!("command timed out after {}ms", timeout_ms),
                        None,
                        started,
                    );
                    tracing::warn!(command = %redacted, timeout_ms, "Shell command timed out");
                    return Err(ShellError::TimedOut { timeout_ms });
                }
            },
            None => child.wait_with_output().await,
        };

        let output = match waited {
            Ok(output) => output,
            Err(e) => {
                finish(logger, handle, redact(&e.to_string()), None, started);
                return Err(ShellError::Spawn(e));
            }
        };
        guard.disarm();

        let exit_code = output.status.code();
        finish(logger, handle, combined_output(&output), exit_code, started);

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = failure_text(&output);
            tracing::warn!(command = %redacted, exit_code = ?exit_code, "Shell command failed");
            Err(ShellError::ExecutionFailed { exit_code, stderr })
        }
    }
}

fn finish(
    logger: &dyn OperationLogger,
    handle: CommandHandle,
    output: String,
    exit_code: Option<i32>,
    started: Instant,
) {
    logger.update_command(
        handle,
        CommandUpdate {
            output,
            exit_code,
            duration_ms: started.elapsed().as_millis() as u64,
        },
    );
}

/// Redacted, sanitized stdout followed by stderr, tail-truncated
fn combined_output(output: &Output) -> String {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
        if !combined.is_empty() && !combined.ends_with('\n') {
            combined.push('\n');
        }
        combined.push_str(&stderr);
    }
    let cleaned = ContentSanitizer::sanitize_output(&redact(&combined));
    tail(cleaned, MAX_LOGGED_OUTPUT)
}

/// Redacted stderr, falling back to stdout when the tool reported errors there
fn failure_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).into_owned()
    } else {
        stderr.into_owned()
    };
    tail(
        ContentSanitizer::sanitize_output(&redact(text.trim())),
        MAX_LOGGED_OUTPUT,
    )
}

fn tail(text: String, limit: usize) -> String {
    if text.len() <= limit {
        return text;
    }
    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{CommandStatus, MemoryLogger};

    #[tokio::test]
    async fn test_execute_returns_stdout_and_logs_two_phases() {
        let logger = MemoryLogger::new();
        let out = ShellExecutor::new()
            .execute("printf 'hello'", &logger)
            .await
            .unwrap();
        assert_eq!(out, "hello");

        let commands = logger.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].command, "printf 'hello'");
        assert_eq!(commands[0].status, CommandStatus::Succeeded);
        assert_eq!(commands[0].exit_code, Some(0));
        assert_eq!(commands[0].output.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_failure_carries_redacted_stderr() {
        let logger = MemoryLogger::new();
        let err = ShellExecutor::new()
            .execute("echo 'denied for --password=hunter2' >&2; exit 3", &logger)
            .await
            .unwrap_err();

        match err {
            ShellError::ExecutionFailed { exit_code, stderr } => {
                assert_eq!(exit_code, Some(3));
                assert!(stderr.contains("--password=***"));
                assert!(!stderr.contains("hunter2"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let entry = &logger.commands()[0];
        assert_eq!(entry.status, CommandStatus::Failed);
        assert!(!entry.command.contains("hunter2"));
        assert!(!entry.output.clone().unwrap_or_default().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_timeout_is_reported_distinctly() {
        let logger = MemoryLogger::new();
        let started = Instant::now();
        let err = ShellExecutor::new()
            .execute_with_timeout("sleep 30", Duration::from_millis(200), &logger)
            .await
            .unwrap_err();

        assert!(matches!(err, ShellError::TimedOut { timeout_ms: 200 }));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(logger.commands()[0].exit_code, None);
    }

    #[test]
    fn test_tail_respects_char_boundaries() {
        let text = "é".repeat(10);
        let cut = tail(text, 5);
        assert!(cut.len() <= 5);
        assert!(cut.chars().all(|c| c == 'é'));
    }
}
