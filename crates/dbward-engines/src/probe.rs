use dbward_core::sanitization::ContentSanitizer;
use dbward_core::{ConnectionTestResult, OperationLogger, ShellError, ShellExecutor, redact};
use std::time::{Duration, Instant};

/// Run a probe command within `timeout`.
///
/// Never fails: unreachable servers, bad credentials and timeouts are all
/// reported through the returned result, with a timeout message distinct
/// from a command failure.
pub async fn run_probe(
    executor: &ShellExecutor,
    command: &str,
    timeout: Duration,
    logger: &dyn OperationLogger,
) -> ConnectionTestResult {
    let started = Instant::now();
    match executor
        .execute_with_timeout(command, timeout, logger)
        .await
    {
        Ok(output) => ConnectionTestResult::success(
            started.elapsed(),
            ContentSanitizer::sanitize_output(&redact(output.trim())),
        ),
        Err(ShellError::TimedOut { .. }) => ConnectionTestResult::timed_out(timeout),
        Err(e) => ConnectionTestResult::failure(started.elapsed(), e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbward_core::MemoryLogger;

    #[tokio::test]
    async fn test_probe_outcomes() {
        let executor = ShellExecutor::new();
        let logger = MemoryLogger::new();
        let timeout = Duration::from_secs(5);

        let ok = run_probe(&executor, "echo PONG", timeout, &logger).await;
        assert!(ok.success);
        assert_eq!(ok.details.raw_output, "PONG");

        let failed = run_probe(&executor, "echo 'no route' >&2; exit 1", timeout, &logger).await;
        assert!(!failed.success);
        assert!(failed.message.contains("no route"));
        assert!(!failed.message.contains("timed out"));

        let slow = run_probe(&executor, "sleep 5", Duration::from_millis(100), &logger).await;
        assert!(!slow.success);
        assert!(slow.message.contains("timed out"));
    }
}
