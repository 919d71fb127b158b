//! Process-group teardown for spawned shells.
//!
//! Commands run as `sh -c '<line>'`, so the process we hold is the shell and
//! the real work happens in its children. Every child is spawned in its own
//! process group and the guard kills the whole group when dropped, which is
//! what makes dropping an invocation future a working cancellation.

/// Kills a process group on drop unless disarmed.
#[derive(Debug)]
pub struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    /// Guard the group led by `pid` (the child was spawned with `process_group(0)`)
    pub fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    /// The child exited normally; leave the group alone
    pub fn disarm(mut self) {
        self.pgid = None;
    }

    /// Kill the group immediately. Subsequent calls and the drop are no-ops.
    pub fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            kill_group(pgid);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pgid.is_some()
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    let Ok(pgid) = i32::try_from(pgid) else {
        return;
    };
    if pgid <= 1 {
        return;
    }
    // SAFETY: kill(2) takes plain integers and touches no memory we own
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc != 0 {
        // ESRCH: the group already exited
        tracing::debug!(pgid, error = %std::io::Error::last_os_error(), "Process group kill skipped");
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disarmed_guard_is_inert() {
        let guard = ProcessGroupGuard::new(None);
        assert!(!guard.is_armed());
        guard.disarm();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_guard_kills_group_on_drop() {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg("sleep 30").process_group(0);
        let mut child = cmd.spawn().unwrap();

        let guard = ProcessGroupGuard::new(child.id());
        assert!(guard.is_armed());
        drop(guard);

        let status = tokio::time::timeout(std::time::Duration::from_secs(5), child.wait())
            .await
            .unwrap()
            .unwrap();
        assert!(!status.success());
    }
}
