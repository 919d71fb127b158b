//! Local directory volumes.
//!
//! Writes land in a `.partial` sibling first and are renamed into place once
//! the stream is fully flushed, so readers never observe a half-written
//! artifact.

use crate::config::parse_config;
use crate::handle::{BoxedReader, StorageHandle, normalize_path};
use crate::provider::StorageFactory;
use async_trait::async_trait;
use dbward_core::{StorageError, StorageResult, VolumeDescriptor, VolumeKind};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Deserialize)]
struct LocalConfig {
    path: PathBuf,
}

/// A volume rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalVolume {
    root: PathBuf,
}

impl LocalVolume {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> StorageResult<(String, PathBuf)> {
        let normalized = normalize_path(path)?;
        let full = self.root.join(&normalized);
        Ok((normalized, full))
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    target.with_file_name(name)
}

#[async_trait]
impl StorageHandle for LocalVolume {
    fn kind(&self) -> VolumeKind {
        VolumeKind::Local
    }

    async fn write_stream(&self, path: &str, mut reader: BoxedReader) -> StorageResult<u64> {
        let (_, target) = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let partial = partial_path(&target);
        let result = async {
            let mut file = fs::File::create(&partial).await?;
            let written = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&partial, &target).await?;
            Ok::<u64, std::io::Error>(written)
        }
        .await;

        match result {
            Ok(written) => {
                tracing::debug!(path = %target.display(), bytes = written, "Wrote local artifact");
                Ok(written)
            }
            Err(e) => {
                match fs::remove_file(&partial).await {
                    Err(cleanup) if cleanup.kind() != ErrorKind::NotFound => {
                        tracing::warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial file");
                    }
                    _ => {}
                }
                Err(e.into())
            }
        }
    }

    async fn read_stream(&self, path: &str) -> StorageResult<BoxedReader> {
        let (normalized, full) = self.resolve(path)?;
        match fs::File::open(&full).await {
            Ok(file) => Ok(Box::pin(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound { path: normalized })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let (_, full) = self.resolve(path)?;
        Ok(fs::try_exists(&full).await?)
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let (_, full) = self.resolve(path)?;
        match fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Opens [`LocalVolume`]s from a `{ "path": "<dir>" }` config
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFactory;

#[async_trait]
impl StorageFactory for LocalFactory {
    fn kind(&self) -> VolumeKind {
        VolumeKind::Local
    }

    async fn open(&self, volume: &VolumeDescriptor) -> StorageResult<Arc<dyn StorageHandle>> {
        let config: LocalConfig = parse_config(volume)?;
        if config.path.as_os_str().is_empty() {
            return Err(StorageError::invalid_config(
                VolumeKind::Local,
                "path cannot be empty",
            ));
        }
        fs::create_dir_all(&config.path).await?;
        Ok(Arc::new(LocalVolume::new(config.path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn reader(bytes: &'static [u8]) -> BoxedReader {
        Box::pin(bytes)
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let volume = LocalVolume::new(dir.path());

        let written = volume
            .write_stream("daily/app.sql.gz", reader(b"artifact"))
            .await
            .unwrap();
        assert_eq!(written, 8);
        assert!(dir.path().join("daily/app.sql.gz").is_file());
        assert!(!dir.path().join("daily/app.sql.gz.partial").exists());
        assert!(volume.exists("/daily/app.sql.gz").await.unwrap());

        let mut content = String::new();
        volume
            .read_stream("daily/app.sql.gz")
            .await
            .unwrap()
            .read_to_string(&mut content)
            .await
            .unwrap();
        assert_eq!(content, "artifact");

        volume.delete("daily/app.sql.gz").await.unwrap();
        assert!(!volume.exists("daily/app.sql.gz").await.unwrap());
        volume.delete("daily/app.sql.gz").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let volume = LocalVolume::new(dir.path());
        let result = volume.read_stream("nope.gz").await;
        assert!(matches!(result, Err(StorageError::NotFound { path }) if path == "nope.gz"));
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let volume = LocalVolume::new(dir.path().join("root"));
        let result = volume.write_stream("../outside.gz", reader(b"x")).await;
        assert!(matches!(result, Err(StorageError::InvalidPath { .. })));
        assert!(!dir.path().join("outside.gz").exists());
    }

    #[tokio::test]
    async fn test_factory_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested/volume");
        let descriptor = VolumeDescriptor::local("v", root.to_string_lossy());

        let handle = LocalFactory.open(&descriptor).await.unwrap();
        assert_eq!(handle.kind(), VolumeKind::Local);
        assert!(root.is_dir());

        let missing = VolumeDescriptor::new(VolumeKind::Local, "v");
        assert!(matches!(
            LocalFactory.open(&missing).await,
            Err(StorageError::InvalidConfig { .. })
        ));
    }
}
