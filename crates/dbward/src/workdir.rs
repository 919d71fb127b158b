//! Per-invocation scratch directory.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Prefix of every working directory created under the configured parent
pub const WORKDIR_PREFIX: &str = "dbward-";

/// A private (0700) directory that holds dumps and artifacts for one
/// invocation. Removed with everything in it on [`close`](Self::close) or drop.
#[derive(Debug)]
pub struct WorkingDir {
    dir: TempDir,
}

impl WorkingDir {
    /// Create a fresh directory inside `parent`, creating `parent` if needed
    pub async fn create(parent: &Path) -> io::Result<Self> {
        tokio::fs::create_dir_all(parent).await?;
        let dir = tempfile::Builder::new()
            .prefix(WORKDIR_PREFIX)
            .tempdir_in(parent)?;
        restrict(dir.path())?;
        tracing::debug!(path = %dir.path().display(), "Created working directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of `name` inside the directory; nothing is created
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove one file now. Missing files are fine, other errors are logged.
    pub async fn discard(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed working file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove working file"),
        }
    }

    /// Delete the directory and its contents
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove working directory");
        }
    }
}

#[cfg(unix)]
fn restrict(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn restrict(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_directory_lifecycle() {
        let parent = tempfile::tempdir().unwrap();
        let nested = parent.path().join("spool");

        let workdir = WorkingDir::create(&nested).await.unwrap();
        let path = workdir.path().to_path_buf();
        assert!(path.starts_with(&nested));
        assert!(
            path.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with(WORKDIR_PREFIX)
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o700);
        }

        let file = workdir.file("dump.sql");
        std::fs::write(&file, b"data").unwrap();
        workdir.discard(&file).await;
        assert!(!file.exists());
        workdir.discard(&file).await;

        std::fs::write(workdir.file("left-behind"), b"x").unwrap();
        workdir.close();
        assert!(!path.exists());
        assert!(nested.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_directory() {
        let parent = tempfile::tempdir().unwrap();
        let workdir = WorkingDir::create(parent.path()).await.unwrap();
        let path = workdir.path().to_path_buf();
        std::fs::write(workdir.file("raw"), b"x").unwrap();
        drop(workdir);
        assert!(!path.exists());
    }
}
