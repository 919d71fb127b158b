//! The stream-capable storage handle every backend implements.

use async_trait::async_trait;
use dbward_core::{StorageError, StorageResult, VolumeKind};
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Owned async byte stream passed into and out of storage handles
pub type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;

/// A resolved volume.
///
/// Paths are relative to the volume root, `/`-separated, and pass through
/// [`normalize_path`] before use. Streams returned by [`read_stream`] own
/// their backend connection, so dropping the reader closes it.
///
/// [`read_stream`]: StorageHandle::read_stream
#[async_trait]
pub trait StorageHandle: Send + Sync {
    fn kind(&self) -> VolumeKind;

    /// Store everything `reader` yields at `path`, creating parent
    /// directories as needed. Returns the number of bytes written.
    async fn write_stream(&self, path: &str, reader: BoxedReader) -> StorageResult<u64>;

    /// Open `path` for reading; [`StorageError::NotFound`] if it is absent
    async fn read_stream(&self, path: &str) -> StorageResult<BoxedReader>;

    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Remove `path`; removing a missing object is not an error
    async fn delete(&self, path: &str) -> StorageResult<()>;
}

/// Normalize a volume-relative path.
///
/// Leading, trailing and repeated slashes and `.` segments are dropped.
/// Empty paths and `..` segments are rejected so nothing escapes the root.
pub fn normalize_path(path: &str) -> StorageResult<String> {
    let invalid = |reason: &str| StorageError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.contains('\0') {
        return Err(invalid("path contains a NUL byte"));
    }

    let segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect();

    if segments.is_empty() {
        return Err(invalid("path is empty"));
    }
    if segments.contains(&"..") {
        return Err(invalid("parent directory segments are not allowed"));
    }

    Ok(segments.join("/"))
}

/// Place `name` under an optional subdirectory
pub fn join_path(dir: Option<&str>, name: &str) -> String {
    match dir.map(|d| d.trim_matches('/')).filter(|d| !d.is_empty()) {
        Some(dir) => format!("{}/{}", dir, name.trim_start_matches('/')),
        None => name.trim_start_matches('/').to_string(),
    }
}

/// Parent directories of a normalized path, shallowest first
pub(crate) fn parent_dirs(normalized: &str) -> Vec<String> {
    let segments: Vec<&str> = normalized.split('/').collect();
    (1..segments.len())
        .map(|depth| segments[..depth].join("/"))
        .collect()
}
