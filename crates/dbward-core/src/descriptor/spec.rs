use super::connection::{ConnectionDescriptor, EngineKind};
use super::volume::VolumeDescriptor;
use crate::error::SpecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Component, Path, PathBuf};

/// External compressor used for artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    #[default]
    Gzip,
    Zstd,
    /// AES-encrypted 7-Zip archive
    Encrypted,
}

impl CompressionKind {
    /// Accepted compression levels for the underlying tool
    pub fn level_range(&self) -> RangeInclusive<u32> {
        match self {
            CompressionKind::Gzip => 1..=9,
            CompressionKind::Zstd => 1..=19,
            CompressionKind::Encrypted => 0..=9,
        }
    }

    pub fn default_level(&self) -> u32 {
        match self {
            CompressionKind::Gzip => 6,
            CompressionKind::Zstd => 3,
            CompressionKind::Encrypted => 5,
        }
    }

    /// File extension appended to compressed artifacts
    pub fn extension(&self) -> &'static str {
        match self {
            CompressionKind::Gzip => "gz",
            CompressionKind::Zstd => "zst",
            CompressionKind::Encrypted => "7z",
        }
    }
}

impl fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionKind::Gzip => write!(f, "gzip"),
            CompressionKind::Zstd => write!(f, "zstd"),
            CompressionKind::Encrypted => write!(f, "encrypted"),
        }
    }
}

/// Compressor choice plus level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompressionSettings {
    #[serde(default)]
    pub kind: CompressionKind,
    /// Defaults to the compressor's own default level
    #[serde(default)]
    pub level: Option<u32>,
}

impl CompressionSettings {
    pub fn new(kind: CompressionKind, level: u32) -> Self {
        Self {
            kind,
            level: Some(level),
        }
    }

    pub fn effective_level(&self) -> u32 {
        self.level.unwrap_or_else(|| self.kind.default_level())
    }

    pub fn validate(&self) -> Result<(), SpecError> {
        let level = self.effective_level();
        let range = self.kind.level_range();
        if !range.contains(&level) {
            return Err(SpecError::invalid(
                "compression.level",
                format!(
                    "{} level {} outside {}..={}",
                    self.kind,
                    level,
                    range.start(),
                    range.end()
                ),
            ));
        }
        Ok(())
    }
}

/// Everything needed for one backup invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSpec {
    pub connection: ConnectionDescriptor,
    pub volume: VolumeDescriptor,
    /// Source database name (file path for SQLite)
    pub database: String,
    /// Parent for the per-invocation working directory
    pub working_dir: PathBuf,
    /// Subpath under the volume root
    #[serde(default)]
    pub destination_path: Option<String>,
    #[serde(default)]
    pub compression: CompressionSettings,
    /// Artifact base name without extensions; generated when absent
    #[serde(default)]
    pub artifact_name: Option<String>,
}

impl BackupSpec {
    pub fn validate(&self) -> Result<(), SpecError> {
        self.connection.validate()?;
        if self.database.trim().is_empty() {
            return Err(SpecError::invalid("database", "database cannot be empty"));
        }
        validate_working_dir(&self.working_dir)?;
        if let Some(path) = &self.destination_path {
            validate_relative("destination_path", path)?;
        }
        let plain_name = |name: &str| !name.is_empty() && !name.contains('/') && !name.starts_with('.');
        if !self.artifact_name.as_deref().is_none_or(plain_name) {
            return Err(SpecError::invalid(
                "artifact_name",
                "artifact name must be a plain file name",
            ));
        }
        self.compression.validate()
    }
}

/// Artifact stored on a volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Path relative to the volume root
    pub filename: String,
    /// Expected size in bytes; 0 skips the check
    #[serde(default)]
    pub size: u64,
    /// Expected hex SHA-256; verified when present
    #[serde(default)]
    pub checksum: Option<String>,
}

/// Everything needed for one restore invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreSpec {
    pub target: ConnectionDescriptor,
    pub volume: VolumeDescriptor,
    pub artifact: ArtifactRef,
    #[serde(default)]
    pub compression: CompressionKind,
    pub source_engine: EngineKind,
    pub source_database: String,
    /// Schema (database name, or file path for SQLite) that will be recreated
    pub destination_schema: String,
    pub working_dir: PathBuf,
}

impl RestoreSpec {
    pub fn validate(&self) -> Result<(), SpecError> {
        self.target.validate()?;
        validate_relative("artifact.filename", &self.artifact.filename)?;
        if self.destination_schema.trim().is_empty() {
            return Err(SpecError::invalid(
                "destination_schema",
                "destination schema cannot be empty",
            ));
        }
        validate_working_dir(&self.working_dir)
    }
}

/// Result of a successful backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupOutcome {
    /// Path relative to the volume root that was written
    pub filename: String,
    pub size: u64,
    /// Hex SHA-256 of the artifact
    pub checksum: String,
}

fn validate_working_dir(dir: &Path) -> Result<(), SpecError> {
    if dir.as_os_str().is_empty() {
        return Err(SpecError::invalid("working_dir", "working directory cannot be empty"));
    }
    Ok(())
}

fn validate_relative(field: &'static str, path: &str) -> Result<(), SpecError> {
    if path.trim().is_empty() && field == "artifact.filename" {
        return Err(SpecError::invalid(field, "path cannot be empty"));
    }
    let escapes = Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir));
    if escapes {
        return Err(SpecError::invalid(field, "path must not contain '..'"));
    }
    Ok(())
}
