//! Volume kind to backend factory dispatch.

use crate::handle::StorageHandle;
use crate::local::LocalFactory;
use async_trait::async_trait;
use dbward_core::{StorageError, StorageResult, VolumeDescriptor, VolumeKind};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds handles for one volume kind
#[async_trait]
pub trait StorageFactory: Send + Sync {
    fn kind(&self) -> VolumeKind;

    /// Parse the volume's config map and build a handle.
    ///
    /// Config errors are reported here; network backends connect lazily on
    /// first use.
    async fn open(&self, volume: &VolumeDescriptor) -> StorageResult<Arc<dyn StorageHandle>>;
}

/// Registry of storage factories keyed by [`VolumeKind`]
#[derive(Clone, Default)]
pub struct FilesystemProvider {
    factories: HashMap<VolumeKind, Arc<dyn StorageFactory>>,
}

impl std::fmt::Debug for FilesystemProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds: Vec<String> = self.factories.keys().map(|k| k.to_string()).collect();
        f.debug_struct("FilesystemProvider")
            .field("kinds", &kinds)
            .finish()
    }
}

impl FilesystemProvider {
    /// Provider with no backends; every resolve fails with `UnsupportedVolumeType`
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every backend compiled into this build
    pub fn with_defaults() -> Self {
        let mut provider = Self::empty();
        provider.register(LocalFactory);
        #[cfg(feature = "s3")]
        provider.register(crate::s3::S3Factory);
        #[cfg(feature = "sftp")]
        provider.register(crate::sftp::SftpFactory);
        #[cfg(feature = "ftp")]
        provider.register(crate::ftp::FtpFactory);
        provider
    }

    /// Add or replace the factory for its kind
    pub fn register<F: StorageFactory + 'static>(&mut self, factory: F) {
        self.factories.insert(factory.kind(), Arc::new(factory));
    }

    pub fn supports(&self, kind: VolumeKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Resolve a volume descriptor to a handle
    pub async fn resolve(&self, volume: &VolumeDescriptor) -> StorageResult<Arc<dyn StorageHandle>> {
        let factory = self
            .factories
            .get(&volume.kind)
            .ok_or(StorageError::UnsupportedVolumeType { kind: volume.kind })?;
        tracing::debug!(kind = %volume.kind, volume = %volume.name, "Resolving volume");
        factory.open(volume).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_provider_rejects_everything() {
        let provider = FilesystemProvider::empty();
        let result = provider
            .resolve(&VolumeDescriptor::local("v", "/tmp"))
            .await;
        assert!(matches!(
            result,
            Err(StorageError::UnsupportedVolumeType {
                kind: VolumeKind::Local
            })
        ));
    }

    #[tokio::test]
    async fn test_defaults_resolve_local() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FilesystemProvider::with_defaults();
        assert!(provider.supports(VolumeKind::Local));

        let handle = provider
            .resolve(&VolumeDescriptor::local("v", dir.path().to_string_lossy()))
            .await
            .unwrap();
        assert_eq!(handle.kind(), VolumeKind::Local);
    }

    #[cfg(all(feature = "s3", feature = "sftp", feature = "ftp"))]
    #[test]
    fn test_defaults_cover_every_kind() {
        let provider = FilesystemProvider::with_defaults();
        for kind in [VolumeKind::Local, VolumeKind::S3, VolumeKind::Sftp, VolumeKind::Ftp] {
            assert!(provider.supports(kind), "{kind} missing");
        }
    }
}
