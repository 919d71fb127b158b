//! # dbward Storage
//!
//! Resolves a [`VolumeDescriptor`](dbward_core::VolumeDescriptor) to a
//! [`StorageHandle`] that reads and writes artifacts as async byte streams,
//! whatever the backend.
//!
//! ## Backends
//!
//! - **local**: a directory on this host (always available)
//! - **s3**: S3-compatible object storage (feature `s3`)
//! - **sftp**: SSH file transfer through libssh2 (feature `sftp`)
//! - **ftp**: FTP and explicit FTPS (feature `ftp`)
//!
//! SFTP and FTP clients are blocking. They run on the blocking pool and are
//! joined to async readers through the channel bridge in [`bridge`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbward_core::VolumeDescriptor;
//! use dbward_storage::{FilesystemProvider, upload_file};
//! use std::path::Path;
//!
//! # async fn run() -> dbward_core::StorageResult<()> {
//! let provider = FilesystemProvider::with_defaults();
//! let volume = VolumeDescriptor::local("nightly", "/srv/backups");
//! let handle = provider.resolve(&volume).await?;
//! upload_file(handle.as_ref(), Path::new("/tmp/app.sql.gz"), "app/app.sql.gz").await?;
//! # Ok(())
//! # }
//! ```

pub mod bridge;
mod config;
#[cfg(feature = "ftp")]
pub mod ftp;
pub mod handle;
pub mod local;
pub mod provider;
#[cfg(feature = "s3")]
pub mod s3;
#[cfg(feature = "sftp")]
pub mod sftp;
pub mod transfer;

pub use handle::{BoxedReader, StorageHandle, join_path, normalize_path};
pub use local::{LocalFactory, LocalVolume};
pub use provider::{FilesystemProvider, StorageFactory};
pub use transfer::{download_file, upload_file};

#[cfg(feature = "ftp")]
pub use ftp::{FtpFactory, FtpVolume};
#[cfg(feature = "s3")]
pub use s3::{S3Factory, S3Volume};
#[cfg(feature = "sftp")]
pub use sftp::{SftpFactory, SftpVolume};
