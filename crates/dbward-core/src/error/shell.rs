//! Child process failures.

use thiserror::Error;

/// Errors raised by the shell executor.
///
/// `stderr` is always redacted before the error is constructed.
#[derive(Debug, Error)]
pub enum ShellError {
    /// The command exited non-zero or was killed by a signal
    #[error("Command failed ({}): {stderr}", describe_exit(.exit_code))]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The command exceeded its wall-clock budget and was killed
    #[error("Command timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    /// The shell itself could not be started
    #[error("Failed to spawn shell: {0}")]
    Spawn(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl ShellError {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ShellError::ExecutionFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}
