//! Moving files between the working directory and a volume.

use crate::handle::StorageHandle;
use dbward_core::StorageResult;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Stream a local file to `remote` on the volume; returns bytes written
pub async fn upload_file(
    handle: &dyn StorageHandle,
    local: &Path,
    remote: &str,
) -> StorageResult<u64> {
    let file = fs::File::open(local).await?;
    let written = handle.write_stream(remote, Box::pin(file)).await?;
    tracing::info!(kind = %handle.kind(), remote, bytes = written, "Artifact uploaded");
    Ok(written)
}

/// Stream `remote` from the volume into a new local file; returns bytes read.
///
/// The local file may be partially written on error; callers clean up their
/// working directory.
pub async fn download_file(
    handle: &dyn StorageHandle,
    remote: &str,
    local: &Path,
) -> StorageResult<u64> {
    let mut reader = handle.read_stream(remote).await?;
    let mut file = fs::File::create(local).await?;
    let read = tokio::io::copy(&mut reader, &mut file).await?;
    file.flush().await?;
    tracing::info!(kind = %handle.kind(), remote, bytes = read, "Artifact downloaded");
    Ok(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::LocalVolume;
    use dbward_core::StorageError;

    #[tokio::test]
    async fn test_upload_then_download() {
        let volume_dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let volume = LocalVolume::new(volume_dir.path());

        let source = work.path().join("dump.sql.gz");
        std::fs::write(&source, vec![42u8; 100_000]).unwrap();

        let written = upload_file(&volume, &source, "srv/dump.sql.gz").await.unwrap();
        assert_eq!(written, 100_000);

        let target = work.path().join("downloaded.gz");
        let read = download_file(&volume, "srv/dump.sql.gz", &target).await.unwrap();
        assert_eq!(read, 100_000);
        assert_eq!(std::fs::read(&target).unwrap(), vec![42u8; 100_000]);
    }

    #[tokio::test]
    async fn test_download_missing_creates_nothing() {
        let volume_dir = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let volume = LocalVolume::new(volume_dir.path());
        let target = work.path().join("never.gz");

        let result = download_file(&volume, "missing.gz", &target).await;
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
        assert!(!target.exists());
    }
}
