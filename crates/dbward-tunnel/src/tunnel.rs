//! The SSH tunnel state machine.
//!
//! ```text
//! Idle -> Allocating -> Starting -> WaitingForReady -> Active -> Closing -> Idle
//!                 \           \              \
//!                  +-----------+--------------+--> Failed -> Closing -> Idle
//! ```

use crate::auth::PreparedAuth;
use crate::command::{LOCAL_HOST, SshInvocation};
use crate::port::allocate_local_port;
use dbward_core::sanitization::ContentSanitizer;
use dbward_core::shell::ProcessGroupGuard;
use dbward_core::{
    CommandHandle, CommandUpdate, LogLevel, OperationLogger, SshDescriptor, SshSettings,
    TunnelError, redact,
};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStderr};
use tokio::task::JoinHandle;

/// Time allowed for ssh to exit after it is killed
const EXIT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    Idle,
    Allocating,
    Starting,
    WaitingForReady,
    Active,
    Failed,
    Closing,
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TunnelState::Idle => "idle",
            TunnelState::Allocating => "allocating",
            TunnelState::Starting => "starting",
            TunnelState::WaitingForReady => "waiting for ready",
            TunnelState::Active => "active",
            TunnelState::Failed => "failed",
            TunnelState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Where the forwarded database is reachable locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelEndpoint {
    pub host: String,
    pub port: u16,
}

/// One ssh port forward, owned by one invocation.
///
/// [`close`](SshTunnel::close) is the orderly teardown; dropping the tunnel
/// kills the ssh process group and removes the temp files synchronously.
pub struct SshTunnel {
    settings: SshSettings,
    state: TunnelState,
    child: Option<Child>,
    group: Option<ProcessGroupGuard>,
    auth: Option<PreparedAuth>,
    endpoint: Option<TunnelEndpoint>,
    log_handle: Option<(CommandHandle, Instant)>,
    stderr_drain: Option<JoinHandle<()>>,
}

impl fmt::Debug for SshTunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshTunnel")
            .field("state", &self.state)
            .field("endpoint", &self.endpoint)
            .field("pid", &self.child.as_ref().and_then(Child::id))
            .finish()
    }
}

impl SshTunnel {
    pub fn new(settings: SshSettings) -> Self {
        Self {
            settings,
            state: TunnelState::Idle,
            child: None,
            group: None,
            auth: None,
            endpoint: None,
            log_handle: None,
            stderr_drain: None,
        }
    }

    pub fn state(&self) -> TunnelState {
        self.state
    }

    pub fn endpoint(&self) -> Option<&TunnelEndpoint> {
        self.endpoint.as_ref()
    }

    /// Key files and askpass scripts currently on disk for this tunnel
    pub fn temp_files(&self) -> Vec<PathBuf> {
        self.auth
            .as_ref()
            .map(PreparedAuth::temp_files)
            .unwrap_or_default()
    }

    /// Forward a local port to `remote_host:remote_port` through the bastion.
    ///
    /// On failure everything acquired so far is released and the tunnel is
    /// back to [`TunnelState::Idle`].
    pub async fn establish(
        &mut self,
        ssh: &SshDescriptor,
        remote_host: &str,
        remote_port: u16,
        logger: &dyn OperationLogger,
    ) -> Result<TunnelEndpoint, TunnelError> {
        if self.state != TunnelState::Idle {
            return Err(TunnelError::InvalidState {
                state: self.state.to_string(),
            });
        }

        match self.try_establish(ssh, remote_host, remote_port, logger).await {
            Ok(endpoint) => {
                self.state = TunnelState::Active;
                self.endpoint = Some(endpoint.clone());
                logger.log(
                    "SSH tunnel established",
                    LogLevel::Info,
                    Some(serde_json::json!({
                        "bastion": ssh.safe(),
                        "local_port": endpoint.port,
                        "remote": format!("{}:{}", remote_host, remote_port),
                    })),
                );
                Ok(endpoint)
            }
            Err(e) => {
                self.state = TunnelState::Failed;
                logger.log(&e.to_string(), LogLevel::Error, None);
                tracing::warn!(bastion = %ssh.host, error = %e, "SSH tunnel failed");
                self.close_with(Some(logger)).await;
                Err(e)
            }
        }
    }

    async fn try_establish(
        &mut self,
        ssh: &SshDescriptor,
        remote_host: &str,
        remote_port: u16,
        logger: &dyn OperationLogger,
    ) -> Result<TunnelEndpoint, TunnelError> {
        ssh.validate()
            .map_err(|e| TunnelError::failed(format!("invalid SSH descriptor: {}", e)))?;

        self.state = TunnelState::Allocating;
        let local_port = allocate_local_port()?;

        self.state = TunnelState::Starting;
        let auth = PreparedAuth::prepare(&ssh.auth, &self.settings)?;
        let invocation =
            SshInvocation::forward(ssh, &self.settings, &auth, local_port, remote_host, remote_port);
        self.auth = Some(auth);

        let rendered = invocation.display();
        tracing::info!(command = %rendered, "Starting SSH tunnel");
        self.log_handle = Some((logger.start_command(&redact(&rendered)), Instant::now()));

        let child = invocation
            .command()
            .spawn()
            .map_err(|io| TunnelError::Spawn {
                program: invocation.program().to_string(),
                io,
            })?;
        self.group = Some(ProcessGroupGuard::new(child.id()));
        self.child = Some(child);

        self.state = TunnelState::WaitingForReady;
        self.wait_until_ready(local_port).await?;

        // ssh keeps running; its stderr must not fill up
        if let Some(stderr) = self.child.as_mut().and_then(|c| c.stderr.take()) {
            self.stderr_drain = Some(drain_stderr(stderr));
        }

        Ok(TunnelEndpoint {
            host: LOCAL_HOST.to_string(),
            port: local_port,
        })
    }

    /// Poll the forwarded port until it accepts a connection
    async fn wait_until_ready(&mut self, local_port: u16) -> Result<(), TunnelError> {
        let interval = self.settings.ready_poll_interval();
        for attempt in 1..=self.settings.ready_max_attempts {
            let exited = match self.child.as_mut() {
                Some(child) => child.try_wait().map_err(|io| TunnelError::Spawn {
                    program: self.settings.binary.clone(),
                    io,
                })?,
                None => return Err(TunnelError::failed("ssh process missing")),
            };
            if let Some(status) = exited {
                let stderr = self.take_stderr().await;
                let message = if stderr.is_empty() {
                    format!("ssh exited before the tunnel was ready ({})", status)
                } else {
                    stderr
                };
                return Err(TunnelError::failed(message));
            }

            let connect = TcpStream::connect((LOCAL_HOST, local_port));
            if let Ok(Ok(_)) = tokio::time::timeout(interval, connect).await {
                tracing::debug!(attempt, local_port, "Forwarded port is ready");
                return Ok(());
            }
            tokio::time::sleep(interval).await;
        }

        // Still running but never ready: stop it so stderr reaches EOF
        self.kill_process().await;
        let stderr = self.take_stderr().await;
        let budget = humantime::format_duration(self.settings.ready_budget());
        let message = if stderr.is_empty() {
            format!("forwarded port {} not ready after {}", local_port, budget)
        } else {
            format!("forwarded port {} not ready after {}: {}", local_port, budget, stderr)
        };
        Err(TunnelError::failed(message))
    }

    /// Redacted, condensed stderr of the ssh process (empty if unavailable)
    async fn take_stderr(&mut self) -> String {
        let Some(mut stderr) = self.child.as_mut().and_then(|c| c.stderr.take()) else {
            return String::new();
        };
        let mut raw = String::new();
        let read = tokio::time::timeout(EXIT_GRACE, stderr.read_to_string(&mut raw)).await;
        if !matches!(read, Ok(Ok(_))) {
            tracing::debug!("Could not read complete ssh stderr");
        }
        redact(&ContentSanitizer::condense_stderr(&raw))
    }

    async fn kill_process(&mut self) {
        if let Some(mut group) = self.group.take() {
            group.kill();
        }
        if let Some(child) = self.child.as_mut() {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "ssh already exited");
            }
            match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
                Ok(Ok(status)) => tracing::debug!(%status, "ssh exited"),
                Ok(Err(e)) => tracing::warn!(error = %e, "Failed to reap ssh"),
                Err(_) => tracing::warn!("ssh did not exit after kill"),
            }
        }
    }

    /// Stop ssh and delete temp files. Idempotent, never fails.
    pub async fn close(&mut self) {
        self.close_with(None).await;
    }

    async fn close_with(&mut self, logger: Option<&dyn OperationLogger>) {
        if self.state == TunnelState::Idle && self.child.is_none() && self.auth.is_none() {
            return;
        }
        let requested = self.state == TunnelState::Active;
        self.state = TunnelState::Closing;

        self.kill_process().await;
        if let Some(drain) = self.stderr_drain.take() {
            drain.abort();
        }
        if let (Some((handle, started)), Some(logger)) = (self.log_handle.take(), logger) {
            let (output, exit_code) = if requested {
                ("tunnel closed", Some(0))
            } else {
                ("tunnel failed", None)
            };
            logger.update_command(
                handle,
                CommandUpdate {
                    output: output.to_string(),
                    exit_code,
                    duration_ms: started.elapsed().as_millis() as u64,
                },
            );
        }
        self.child = None;
        if let Some(mut auth) = self.auth.take() {
            auth.cleanup();
        }
        self.endpoint = None;
        self.state = TunnelState::Idle;
        tracing::debug!("SSH tunnel closed");
    }

    /// [`close`](Self::close) that also completes the command log entry
    pub async fn close_logged(&mut self, logger: &dyn OperationLogger) {
        self.close_with(Some(logger)).await;
    }
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        // The guard kills the group, kill_on_drop takes the child, and
        // PreparedAuth removes its files
        if self.child.is_some() || self.auth.is_some() {
            tracing::debug!(state = %self.state, "Tearing down SSH tunnel on drop");
        }
        if let Some(mut group) = self.group.take() {
            group.kill();
        }
        if let Some(drain) = self.stderr_drain.take() {
            drain.abort();
        }
    }
}

/// Read ssh stderr line by line until EOF, keeping nothing but a debug trace
fn drain_stderr(stderr: ChildStderr) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(line = %redact(&line), "ssh stderr");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbward_core::{MemoryLogger, SshAuth};
    use rstest::rstest;

    #[rstest]
    #[case(TunnelState::Idle, "idle")]
    #[case(TunnelState::Allocating, "allocating")]
    #[case(TunnelState::Starting, "starting")]
    #[case(TunnelState::WaitingForReady, "waiting for ready")]
    #[case(TunnelState::Active, "active")]
    #[case(TunnelState::Failed, "failed")]
    #[case(TunnelState::Closing, "closing")]
    fn test_state_names(#[case] state: TunnelState, #[case] name: &str) {
        assert_eq!(state.to_string(), name);
    }

    #[tokio::test]
    async fn test_close_on_fresh_tunnel_is_noop() {
        let mut tunnel = SshTunnel::new(SshSettings::default());
        tunnel.close().await;
        tunnel.close().await;
        assert_eq!(tunnel.state(), TunnelState::Idle);
        assert!(tunnel.endpoint().is_none());
    }

    #[tokio::test]
    async fn test_missing_binary_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SshSettings {
            binary: dir.path().join("no-such-ssh").to_string_lossy().into_owned(),
            temp_dir: Some(dir.path().to_path_buf()),
            ..SshSettings::default()
        };
        let mut tunnel = SshTunnel::new(settings);
        let ssh = SshDescriptor::new("bastion", "deploy", SshAuth::key("KEY"));
        let logger = MemoryLogger::new();

        let err = tunnel
            .establish(&ssh, "10.0.0.5", 5432, &logger)
            .await
            .unwrap_err();
        assert!(matches!(err, TunnelError::Spawn { .. }));
        assert_eq!(tunnel.state(), TunnelState::Idle);
        assert!(tunnel.temp_files().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_descriptor_rejected() {
        let mut tunnel = SshTunnel::new(SshSettings::default());
        let ssh = SshDescriptor::new("-oProxyCommand=evil", "deploy", SshAuth::password("pw"));
        let err = tunnel
            .establish(&ssh, "db", 3306, &MemoryLogger::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TunnelError::SshTunnelFailed { .. }));
    }
}
