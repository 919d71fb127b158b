//! SFTP volumes over libssh2.
//!
//! Every operation opens its own session on the blocking pool; the session
//! lives exactly as long as the transfer it serves.

use crate::bridge::{blocking_reader, run_blocking, sync_source};
use crate::config::{non_blank, parse_config};
use crate::handle::{BoxedReader, StorageHandle, normalize_path, parent_dirs};
use crate::provider::StorageFactory;
use async_trait::async_trait;
use dbward_core::{
    SECRET_MASK, SecretString, StorageError, StorageResult, VolumeDescriptor, VolumeKind,
};
use serde::Deserialize;
use ssh2::{ErrorCode, Session, Sftp};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const KIND: VolumeKind = VolumeKind::Sftp;

/// `LIBSSH2_FX_NO_SUCH_FILE`
const FX_NO_SUCH_FILE: i32 = 2;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

fn default_port() -> u16 {
    22
}

#[derive(Debug, Clone, Deserialize)]
struct SftpConfig {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    username: String,
    #[serde(default)]
    password: Option<SecretString>,
    #[serde(default)]
    private_key: Option<SecretString>,
    #[serde(default)]
    passphrase: Option<SecretString>,
    #[serde(default)]
    root: Option<String>,
}

/// Credentials a session authenticates with; a key wins over a password
#[derive(PartialEq, Eq)]
enum SftpAuth<'a> {
    Key {
        key: &'a str,
        passphrase: Option<&'a str>,
    },
    Password(&'a str),
}

impl std::fmt::Debug for SftpAuth<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key { passphrase, .. } => f
                .debug_struct("Key")
                .field("key", &SECRET_MASK)
                .field("passphrase", &passphrase.map(|_| SECRET_MASK))
                .finish(),
            Self::Password(_) => f.debug_tuple("Password").field(&SECRET_MASK).finish(),
        }
    }
}

impl SftpConfig {
    /// Blank values count as absent
    fn auth(&self) -> Option<SftpAuth<'_>> {
        if let Some(key) = filled(&self.private_key) {
            return Some(SftpAuth::Key {
                key,
                passphrase: filled(&self.passphrase),
            });
        }
        filled(&self.password).map(SftpAuth::Password)
    }
}

fn filled(secret: &Option<SecretString>) -> Option<&str> {
    secret
        .as_ref()
        .map(SecretString::expose)
        .filter(|value| !value.is_empty())
}

fn backend_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::backend(KIND, e)
}

fn is_missing(e: &ssh2::Error) -> bool {
    matches!(e.code(), ErrorCode::SFTP(FX_NO_SUCH_FILE))
}

/// An SFTP server directory
#[derive(Debug, Clone)]
pub struct SftpVolume {
    config: Arc<SftpConfig>,
}

impl SftpVolume {
    fn remote_path(&self, path: &str) -> StorageResult<(String, PathBuf)> {
        let normalized = normalize_path(path)?;
        let full = match non_blank(&self.config.root) {
            Some(root) => Path::new(root).join(&normalized),
            None => PathBuf::from(&normalized),
        };
        Ok((normalized, full))
    }

    fn root_path(&self) -> PathBuf {
        non_blank(&self.config.root)
            .map(PathBuf::from)
            .unwrap_or_default()
    }
}

/// Open an authenticated session and its SFTP subsystem
fn connect(config: &SftpConfig) -> StorageResult<(Session, Sftp)> {
    let addrs = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|e| backend_error(format!("cannot resolve {}: {}", config.host, e)))?;

    let mut last_error = None;
    let mut tcp = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => {
                tcp = Some(stream);
                break;
            }
            Err(e) => last_error = Some(e),
        }
    }
    let tcp = match (tcp, last_error) {
        (Some(tcp), _) => tcp,
        (None, Some(e)) => return Err(backend_error(format!("connect to {} failed: {}", config.host, e))),
        (None, None) => return Err(backend_error(format!("{} resolved to no addresses", config.host))),
    };

    let mut session = Session::new().map_err(backend_error)?;
    session.set_tcp_stream(tcp);
    session.handshake().map_err(backend_error)?;

    match config.auth() {
        Some(SftpAuth::Key { key, passphrase }) => session
            .userauth_pubkey_memory(&config.username, None, key, passphrase)
            .map_err(backend_error)?,
        Some(SftpAuth::Password(password)) => session
            .userauth_password(&config.username, password)
            .map_err(backend_error)?,
        None => {
            return Err(StorageError::invalid_config(KIND, "no credentials configured"));
        }
    }
    if !session.authenticated() {
        return Err(backend_error("authentication failed"));
    }

    let sftp = session.sftp().map_err(backend_error)?;
    Ok((session, sftp))
}

/// `mkdir -p` relative to `root`; existing directories are fine
fn ensure_dirs(sftp: &Sftp, root: &Path, normalized: &str) -> StorageResult<()> {
    for dir in parent_dirs(normalized) {
        let path = root.join(&dir);
        if sftp.stat(&path).is_ok() {
            continue;
        }
        sftp.mkdir(&path, 0o750)
            .map_err(|e| backend_error(format!("mkdir {}: {}", path.display(), e)))?;
    }
    Ok(())
}

#[async_trait]
impl StorageHandle for SftpVolume {
    fn kind(&self) -> VolumeKind {
        KIND
    }

    async fn write_stream(&self, path: &str, reader: BoxedReader) -> StorageResult<u64> {
        let (normalized, full) = self.remote_path(path)?;
        let root = self.root_path();
        let config = Arc::clone(&self.config);
        let mut source = sync_source(reader);

        let written = run_blocking(KIND, move || {
            let (_session, sftp) = connect(&config)?;
            ensure_dirs(&sftp, &root, &normalized)?;
            let mut file = sftp.create(&full).map_err(backend_error)?;
            let written = std::io::copy(&mut source, &mut file)?;
            file.close().map_err(backend_error)?;
            Ok(written)
        })
        .await?;
        tracing::debug!(host = %self.config.host, path, bytes = written, "Uploaded over SFTP");
        Ok(written)
    }

    async fn read_stream(&self, path: &str) -> StorageResult<BoxedReader> {
        let (normalized, full) = self.remote_path(path)?;
        let config = Arc::clone(&self.config);

        blocking_reader(KIND, move |sink| {
            let (_session, sftp) = connect(&config)?;
            let mut file = sftp.open(&full).map_err(|e| {
                if is_missing(&e) {
                    StorageError::NotFound { path: normalized }
                } else {
                    backend_error(e)
                }
            })?;
            sink.pump(&mut file)?;
            Ok(())
        })
        .await
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let (_, full) = self.remote_path(path)?;
        let config = Arc::clone(&self.config);
        run_blocking(KIND, move || {
            let (_session, sftp) = connect(&config)?;
            match sftp.stat(&full) {
                Ok(_) => Ok(true),
                Err(e) if is_missing(&e) => Ok(false),
                Err(e) => Err(backend_error(e)),
            }
        })
        .await
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let (_, full) = self.remote_path(path)?;
        let config = Arc::clone(&self.config);
        run_blocking(KIND, move || {
            let (_session, sftp) = connect(&config)?;
            match sftp.unlink(&full) {
                Ok(()) => Ok(()),
                Err(e) if is_missing(&e) => Ok(()),
                Err(e) => Err(backend_error(e)),
            }
        })
        .await
    }
}

/// Opens [`SftpVolume`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct SftpFactory;

#[async_trait]
impl StorageFactory for SftpFactory {
    fn kind(&self) -> VolumeKind {
        KIND
    }

    async fn open(&self, volume: &VolumeDescriptor) -> StorageResult<Arc<dyn StorageHandle>> {
        let config: SftpConfig = parse_config(volume)?;
        if config.host.trim().is_empty() || config.username.trim().is_empty() {
            return Err(StorageError::invalid_config(
                KIND,
                "host and username are required",
            ));
        }
        if config.auth().is_none() {
            return Err(StorageError::invalid_config(
                KIND,
                "either password or private_key is required",
            ));
        }
        Ok(Arc::new(SftpVolume {
            config: Arc::new(config),
        }))
    }
}
