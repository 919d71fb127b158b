//! Volume resolution through the provider registry

use async_trait::async_trait;
use dbward_core::{StorageError, StorageResult, VolumeDescriptor, VolumeKind};
use dbward_storage::{
    BoxedReader, FilesystemProvider, StorageFactory, StorageHandle, download_file, upload_file,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncReadExt;

/// Keeps objects in memory, keyed by normalized path
#[derive(Default)]
struct MemoryVolume {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl StorageHandle for MemoryVolume {
    fn kind(&self) -> VolumeKind {
        VolumeKind::Ftp
    }

    async fn write_stream(&self, path: &str, mut reader: BoxedReader) -> StorageResult<u64> {
        let path = dbward_storage::normalize_path(path)?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        let len = data.len() as u64;
        self.objects.lock().unwrap().insert(path, data);
        Ok(len)
    }

    async fn read_stream(&self, path: &str) -> StorageResult<BoxedReader> {
        let path = dbward_storage::normalize_path(path)?;
        let data = self
            .objects
            .lock()
            .unwrap()
            .get(&path)
            .cloned()
            .ok_or(StorageError::NotFound { path })?;
        Ok(Box::pin(std::io::Cursor::new(data)))
    }

    async fn exists(&self, path: &str) -> StorageResult<bool> {
        let path = dbward_storage::normalize_path(path)?;
        Ok(self.objects.lock().unwrap().contains_key(&path))
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        let path = dbward_storage::normalize_path(path)?;
        self.objects.lock().unwrap().remove(&path);
        Ok(())
    }
}

struct MemoryFactory(Arc<MemoryVolume>);

#[async_trait]
impl StorageFactory for MemoryFactory {
    fn kind(&self) -> VolumeKind {
        VolumeKind::Ftp
    }

    async fn open(&self, _volume: &VolumeDescriptor) -> StorageResult<Arc<dyn StorageHandle>> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn test_registered_factory_replaces_builtin() {
    let shared = Arc::new(MemoryVolume::default());
    let mut provider = FilesystemProvider::with_defaults();
    provider.register(MemoryFactory(shared.clone()));

    let handle = provider
        .resolve(&VolumeDescriptor::new(VolumeKind::Ftp, "mem"))
        .await
        .unwrap();

    let work = tempfile::tempdir().unwrap();
    let local = work.path().join("a.sql.gz");
    std::fs::write(&local, b"compressed bytes").unwrap();

    upload_file(handle.as_ref(), &local, "/srv1//a.sql.gz").await.unwrap();
    assert!(shared.objects.lock().unwrap().contains_key("srv1/a.sql.gz"));

    let back = work.path().join("b.sql.gz");
    download_file(handle.as_ref(), "srv1/a.sql.gz", &back).await.unwrap();
    assert_eq!(std::fs::read(back).unwrap(), b"compressed bytes");
}

#[tokio::test]
async fn test_local_volume_through_provider() {
    let root = tempfile::tempdir().unwrap();
    let provider = FilesystemProvider::with_defaults();
    let handle = provider
        .resolve(&VolumeDescriptor::local("local", root.path().to_string_lossy()))
        .await
        .unwrap();

    let payload: Vec<u8> = (0..300_000u32).map(|i| (i % 97) as u8).collect();
    let written = handle
        .write_stream("nested/deeper/blob.bin", Box::pin(std::io::Cursor::new(payload.clone())))
        .await
        .unwrap();
    assert_eq!(written, payload.len() as u64);
    assert!(handle.exists("nested/deeper/blob.bin").await.unwrap());

    let mut back = Vec::new();
    handle
        .read_stream("nested/deeper/blob.bin")
        .await
        .unwrap()
        .read_to_end(&mut back)
        .await
        .unwrap();
    assert_eq!(back, payload);
}

#[tokio::test]
async fn test_unregistered_kind() {
    let provider = FilesystemProvider::empty();
    let err = provider
        .resolve(&VolumeDescriptor::new(VolumeKind::S3, "bucket"))
        .await
        .err()
        .unwrap();
    assert_eq!(err.to_string(), "Unsupported volume type: s3");
}
