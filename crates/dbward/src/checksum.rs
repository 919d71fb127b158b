//! Streaming SHA-256 over artifacts.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::io;
use std::path::Path;
use tokio::io::AsyncReadExt;

const READ_BUFFER: usize = 64 * 1024;

/// Size and hex digest of a file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDigest {
    pub size: u64,
    pub sha256: String,
}

/// Hash `path` without loading it into memory
pub async fn digest_file(path: &Path) -> io::Result<FileDigest> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER];
    let mut size = 0u64;

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        size += read as u64;
    }

    Ok(FileDigest {
        size,
        sha256: to_hex(&hasher.finalize()),
    })
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
            let _ = write!(out, "{:02x}", b);
            out
        })
}

/// Case-insensitive comparison of hex digests
pub fn same_digest(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}
