//! SSH authentication material on disk and in the environment.
//!
//! Secrets never appear on the ssh command line:
//!
//! - passwords go through `SSHPASS`, read by `sshpass -e`
//! - private keys are written to a 0600 temp file passed with `-i`
//! - key passphrases are answered by a 0700 askpass script that prints an
//!   environment variable, wired up through `SSH_ASKPASS`
//!
//! The temp files are owned by [`PreparedAuth`] and removed when it is
//! cleaned up or dropped.

use dbward_core::{SecretString, SshAuth, SshSettings, TunnelError};
use std::fs::Permissions;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};

/// Environment variable the askpass script prints
pub const PASSPHRASE_ENV: &str = "DBWARD_SSH_PASSPHRASE";

const ASKPASS_SCRIPT: &str = "#!/bin/sh\nprintf '%s\\n' \"$DBWARD_SSH_PASSPHRASE\"\n";

/// Auth material ready to be attached to an ssh invocation
#[derive(Debug)]
pub struct PreparedAuth {
    /// Run ssh through `sshpass -e`
    pub use_sshpass: bool,
    /// Extra ssh options (`-i`, `-o ...`)
    pub args: Vec<String>,
    /// Variables set on the child only
    pub env: Vec<(String, SecretString)>,
    key_file: Option<TempPath>,
    askpass: Option<TempPath>,
}

impl PreparedAuth {
    /// Write whatever files `auth` needs
    pub fn prepare(auth: &SshAuth, settings: &SshSettings) -> Result<Self, TunnelError> {
        let mut prepared = Self {
            use_sshpass: false,
            args: Vec::new(),
            env: Vec::new(),
            key_file: None,
            askpass: None,
        };

        match auth {
            SshAuth::Password { password } => {
                prepared.use_sshpass = true;
                prepared.env.push(("SSHPASS".to_string(), password.clone()));
                prepared.args.extend(
                    ["-o", "PubkeyAuthentication=no", "-o", "NumberOfPasswordPrompts=1"]
                        .map(String::from),
                );
            }
            SshAuth::Key { private_key } => {
                prepared.attach_key(private_key, settings)?;
                prepared.args.extend(["-o", "BatchMode=yes"].map(String::from));
            }
            SshAuth::KeyWithPassphrase {
                private_key,
                passphrase,
            } => {
                prepared.attach_key(private_key, settings)?;
                let script = write_temp(
                    settings.temp_dir.as_deref(),
                    "dbward-askpass-",
                    ASKPASS_SCRIPT.as_bytes(),
                    0o700,
                )?;
                prepared.env.extend([
                    (PASSPHRASE_ENV.to_string(), passphrase.clone()),
                    (
                        "SSH_ASKPASS".to_string(),
                        SecretString::new(script.to_string_lossy()),
                    ),
                    ("SSH_ASKPASS_REQUIRE".to_string(), SecretString::new("force")),
                    ("DISPLAY".to_string(), SecretString::new(":0")),
                ]);
                prepared.askpass = Some(script);
            }
        }

        Ok(prepared)
    }

    fn attach_key(&mut self, key: &SecretString, settings: &SshSettings) -> Result<(), TunnelError> {
        // OpenSSH rejects key files without a trailing newline
        let mut material = key.expose().trim_end().to_string();
        material.push('\n');
        let path = write_temp(
            settings.temp_dir.as_deref(),
            "dbward-key-",
            material.as_bytes(),
            0o600,
        )?;
        self.args.extend([
            "-i".to_string(),
            path.to_string_lossy().into_owned(),
            "-o".to_string(),
            "IdentitiesOnly=yes".to_string(),
        ]);
        self.key_file = Some(path);
        Ok(())
    }

    /// Paths of the temp files currently on disk
    pub fn temp_files(&self) -> Vec<PathBuf> {
        self.key_file
            .iter()
            .chain(self.askpass.iter())
            .map(|p| p.to_path_buf())
            .collect()
    }

    /// Remove temp files now. Safe to call more than once.
    pub fn cleanup(&mut self) {
        for path in [self.key_file.take(), self.askpass.take()].into_iter().flatten() {
            let shown = path.to_path_buf();
            if let Err(e) = path.close() {
                tracing::warn!(path = %shown.display(), error = %e, "Failed to remove SSH temp file");
            }
        }
    }
}

impl Drop for PreparedAuth {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Write `content` to a fresh temp file with `mode` and close the handle
fn write_temp(
    dir: Option<&Path>,
    prefix: &str,
    content: &[u8],
    mode: u32,
) -> Result<TempPath, TunnelError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    let mut file: NamedTempFile = match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(TunnelError::TempFile)?;

    file.as_file()
        .set_permissions(Permissions::from_mode(mode))
        .map_err(TunnelError::TempFile)?;
    file.write_all(content).map_err(TunnelError::TempFile)?;
    file.as_file().sync_all().map_err(TunnelError::TempFile)?;

    // Closing the handle here matters for the askpass script: exec fails
    // with ETXTBSY while a writable descriptor is open
    Ok(file.into_temp_path())
}
