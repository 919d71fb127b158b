//! Tunnel-free SSH reachability check.

use crate::auth::PreparedAuth;
use crate::command::SshInvocation;
use dbward_core::sanitization::ContentSanitizer;
use dbward_core::{
    CommandUpdate, ConnectionTestResult, OperationLogger, SshDescriptor, SshSettings, redact,
};
use std::time::{Duration, Instant};

/// Remote command run by the probe
const PROBE_COMMAND: &str = "exit 0";

/// Authenticate against the bastion and run a no-op, bounded by `timeout`
pub async fn test_ssh_connection(
    ssh: &SshDescriptor,
    settings: &SshSettings,
    timeout: Duration,
    logger: &dyn OperationLogger,
) -> ConnectionTestResult {
    let started = Instant::now();
    if let Err(e) = ssh.validate() {
        return ConnectionTestResult::failure(started.elapsed(), e.to_string());
    }

    let mut auth = match PreparedAuth::prepare(&ssh.auth, settings) {
        Ok(auth) => auth,
        Err(e) => return ConnectionTestResult::failure(started.elapsed(), e.to_string()),
    };
    let invocation = SshInvocation::remote_command(ssh, settings, &auth, PROBE_COMMAND);
    let handle = logger.start_command(&redact(&invocation.display()));

    let mut command = invocation.command();
    let result = match command.spawn() {
        Ok(child) => match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stderr =
                    redact(&ContentSanitizer::condense_stderr(&String::from_utf8_lossy(&output.stderr)));
                if output.status.success() {
                    ConnectionTestResult::success(started.elapsed(), stderr)
                } else if stderr.is_empty() {
                    ConnectionTestResult::failure(
                        started.elapsed(),
                        format!("ssh exited with {}", output.status),
                    )
                } else {
                    ConnectionTestResult::failure(started.elapsed(), stderr)
                }
            }
            Ok(Err(e)) => ConnectionTestResult::failure(started.elapsed(), e.to_string()),
            // The child was dropped with the future; kill_on_drop stops it
            Err(_) => ConnectionTestResult::timed_out(timeout),
        },
        Err(e) => ConnectionTestResult::failure(
            started.elapsed(),
            format!("failed to start '{}': {}", invocation.program(), e),
        ),
    };

    logger.update_command(
        handle,
        CommandUpdate {
            output: result.details.raw_output.clone(),
            exit_code: None,
            duration_ms: started.elapsed().as_millis() as u64,
        },
    );
    auth.cleanup();
    result
}
