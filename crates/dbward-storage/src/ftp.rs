//! FTP and explicit FTPS volumes.

use crate::bridge::{blocking_reader, run_blocking, sync_source};
use crate::config::{default_true, parse_config};
use crate::handle::{BoxedReader, StorageHandle, normalize_path, parent_dirs};
use crate::provider::StorageFactory;
use async_trait::async_trait;
use dbward_core::{SecretString, StorageError, StorageResult, VolumeDescriptor, VolumeKind};
use serde::Deserialize;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpError, Mode, NativeTlsConnector, NativeTlsFtpStream, Status};

const KIND: VolumeKind = VolumeKind::Ftp;

fn default_port() -> u16 {
    21
}

fn default_timeout() -> u64 {
    90
}

#[derive(Debug, Clone, Deserialize)]
struct FtpConfig {
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<SecretString>,
    #[serde(default)]
    root: String,
    /// Explicit FTPS (`AUTH TLS`) after connecting
    #[serde(default)]
    ssl: bool,
    #[serde(default = "default_true")]
    passive: bool,
    /// Control and data socket timeout, seconds
    #[serde(default = "default_timeout")]
    timeout: u64,
}

impl FtpConfig {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    fn remote(&self, normalized: &str) -> String {
        let root = self.root.trim_end_matches('/');
        if root.is_empty() {
            normalized.to_string()
        } else {
            format!("{}/{}", root, normalized)
        }
    }
}

fn backend_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::backend(KIND, e)
}

fn is_unavailable(e: &FtpError) -> bool {
    matches!(e, FtpError::UnexpectedResponse(response) if response.status == Status::FileUnavailable)
}

/// Connected, logged-in control channel in binary mode
fn connect(config: &FtpConfig) -> StorageResult<NativeTlsFtpStream> {
    let addr = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|e| backend_error(format!("cannot resolve {}: {}", config.host, e)))?
        .next()
        .ok_or_else(|| backend_error(format!("{} resolved to no addresses", config.host)))?;

    let mut ftp = NativeTlsFtpStream::connect_timeout(addr, config.timeout()).map_err(backend_error)?;
    if config.ssl {
        let connector = native_tls::TlsConnector::new().map_err(backend_error)?;
        ftp = ftp
            .into_secure(NativeTlsConnector::from(connector), &config.host)
            .map_err(backend_error)?;
    }

    ftp.get_ref()
        .set_read_timeout(Some(config.timeout()))
        .map_err(StorageError::Io)?;

    let username = config.username.as_deref().unwrap_or("anonymous");
    let password = config.password.as_ref().map(SecretString::expose).unwrap_or("");
    ftp.login(username, password).map_err(backend_error)?;
    ftp.set_mode(if config.passive { Mode::Passive } else { Mode::Active });
    ftp.transfer_type(FileType::Binary).map_err(backend_error)?;
    Ok(ftp)
}

fn quit(mut ftp: NativeTlsFtpStream) {
    if let Err(e) = ftp.quit() {
        tracing::debug!(error = %e, "FTP QUIT failed");
    }
}

/// An FTP server directory
#[derive(Debug, Clone)]
pub struct FtpVolume {
    config: Arc<FtpConfig>,
}

impl FtpVolume {
    fn resolve(&self, path: &str) -> StorageResult<(String, String)> {
        let normalized = normalize_path(path)?;
        let remote = self.config.remote(&normalized);
        Ok((normalized, remote))
    }
}

#[async_trait]
impl StorageHandle for FtpVolume {
    fn kind(&self) -> VolumeKind {
        KIND
    }

    async fn write_stream(&self, path: &str, reader: BoxedReader) -> StorageResult<u64> {
        let (normalized, remote) = self.resolve(path)?;
        let config = Arc::clone(&self.config);
        let mut source = sync_source(reader);

        let written = run_blocking(KIND, move || {
            let mut ftp = connect(&config)?;
            for dir in parent_dirs(&normalized) {
                // Fails when the directory exists; the upload reports real problems
                let _ = ftp.mkdir(&config.remote(&dir));
            }
            let written = ftp.put_file(&remote, &mut source).map_err(backend_error);
            quit(ftp);
            written
        })
        .await?;
        tracing::debug!(host = %self.config.host, path, bytes = written, "Uploaded over FTP");
        Ok(written)
    }

    async fn read_stream(&self, path: &str) -> StorageResult<BoxedReader> {
        let (normalized, remote) = self.resolve(path)?;
        let config = Arc::clone(&self.config);

        blocking_reader(KIND, move |sink| {
            let mut ftp = connect(&config)?;
            let result = ftp.retr(&remote, |data| {
                sink.pump(data).map_err(FtpError::ConnectionError)
            });
            quit(ftp);
            match result {
                Ok(_) => Ok(()),
                Err(e) if is_unavailable(&e) => Err(StorageError::NotFound { path: normalized }),
                Err(FtpError::ConnectionError(io)) => Err(StorageError::Io(io)),
                Err(e) => Err(backend_error(e)),
            }
        })
        .await
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let (_, remote) = self.resolve(path)?;
        let config = Arc::clone(&self.config);
        run_blocking(KIND, move || {
            let mut ftp = connect(&config)?;
            let result = match ftp.size(&remote) {
                Ok(_) => Ok(true),
                Err(e) if is_unavailable(&e) => Ok(false),
                Err(e) => Err(backend_error(e)),
            };
            quit(ftp);
            result
        })
        .await
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let (_, remote) = self.resolve(path)?;
        let config = Arc::clone(&self.config);
        run_blocking(KIND, move || {
            let mut ftp = connect(&config)?;
            let result = match ftp.rm(&remote) {
                Ok(()) => Ok(()),
                Err(e) if is_unavailable(&e) => Ok(()),
                Err(e) => Err(backend_error(e)),
            };
            quit(ftp);
            result
        })
        .await
    }
}

/// Opens [`FtpVolume`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct FtpFactory;

#[async_trait]
impl StorageFactory for FtpFactory {
    fn kind(&self) -> VolumeKind {
        KIND
    }

    async fn open(&self, volume: &VolumeDescriptor) -> StorageResult<Arc<dyn StorageHandle>> {
        let config: FtpConfig = parse_config(volume)?;
        if config.host.trim().is_empty() {
            return Err(StorageError::invalid_config(KIND, "host cannot be empty"));
        }
        if config.timeout == 0 {
            return Err(StorageError::invalid_config(
                KIND,
                "timeout must be greater than zero",
            ));
        }
        Ok(Arc::new(FtpVolume {
            config: Arc::new(config),
        }))
    }
}
