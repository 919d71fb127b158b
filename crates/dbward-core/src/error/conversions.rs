//! The flattened top-level error and conversions into it.
//!
//! Pipeline callers match on the variants here rather than on the per-concern
//! enums; failures that map onto a named taxonomy entry are lifted out of
//! their wrapper so `?` lands them in the right place.

use super::config::ConfigError;
use super::engine::{EngineError, EngineOperation};
use super::shell::ShellError;
use super::spec::SpecError;
use super::storage::StorageError;
use super::tunnel::TunnelError;
use crate::descriptor::{EngineKind, VolumeKind};
use thiserror::Error;

/// Main error type for dbward operations.
#[derive(Debug, Error)]
pub enum DbwardError {
    /// A shell command exited non-zero; `stderr` is redacted
    #[error("Shell execution failed (exit code {}): {stderr}", exit_label(.exit_code))]
    ShellExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Command timed out after {timeout_ms}ms")]
    CommandTimedOut { timeout_ms: u64 },

    #[error("Unsupported engine: {engine}")]
    UnsupportedEngine { engine: EngineKind },

    #[error("Unsupported volume type: {kind}")]
    UnsupportedVolumeType { kind: VolumeKind },

    #[error("Engine '{engine}' does not support {operation}")]
    UnsupportedOperation {
        engine: EngineKind,
        operation: EngineOperation,
    },

    #[error("SSH tunnel failed: {message}")]
    SshTunnelFailed { message: String },

    /// Restore source and target engines differ
    #[error("Engine mismatch: artifact from {source_engine} cannot be restored into {target_engine}")]
    EngineMismatch {
        source_engine: EngineKind,
        target_engine: EngineKind,
    },

    /// Pre-flight connectivity test against the restore target failed
    #[error("Connectivity check failed: {message}")]
    ConnectivityFailed { message: String },

    #[error("Checksum mismatch for '{filename}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    #[error("Size mismatch for '{filename}': expected {expected} bytes, got {actual}")]
    SizeMismatch {
        filename: String,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid spec field '{field}': {reason}")]
    InvalidSpec { field: &'static str, reason: String },

    #[error("{engine} admin operation failed: {message}")]
    EngineAdmin { engine: EngineKind, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Tunnel error: {0}")]
    Tunnel(TunnelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}

impl From<ShellError> for DbwardError {
    fn from(err: ShellError) -> Self {
        match err {
            ShellError::ExecutionFailed { exit_code, stderr } => {
                DbwardError::ShellExecutionFailed { exit_code, stderr }
            }
            ShellError::TimedOut { timeout_ms } => DbwardError::CommandTimedOut { timeout_ms },
            ShellError::Spawn(io) => DbwardError::ShellExecutionFailed {
                exit_code: None,
                stderr: format!("failed to spawn shell: {}", io),
            },
        }
    }
}

impl From<EngineError> for DbwardError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnsupportedEngine { engine } => DbwardError::UnsupportedEngine { engine },
            EngineError::UnsupportedOperation { engine, operation } => {
                DbwardError::UnsupportedOperation { engine, operation }
            }
            EngineError::InvalidTarget { reason } => DbwardError::InvalidSpec {
                field: "target",
                reason,
            },
            EngineError::Shell(shell) => shell.into(),
            EngineError::Admin { engine, message } => DbwardError::EngineAdmin { engine, message },
        }
    }
}

impl From<StorageError> for DbwardError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnsupportedVolumeType { kind } => {
                DbwardError::UnsupportedVolumeType { kind }
            }
            other => DbwardError::Storage(other),
        }
    }
}

impl From<TunnelError> for DbwardError {
    fn from(err: TunnelError) -> Self {
        match err {
            TunnelError::SshTunnelFailed { message } => DbwardError::SshTunnelFailed { message },
            other => DbwardError::Tunnel(other),
        }
    }
}

impl From<SpecError> for DbwardError {
    fn from(err: SpecError) -> Self {
        match err {
            SpecError::Invalid { field, reason } => DbwardError::InvalidSpec { field, reason },
        }
    }
}

/// Result type alias for dbward operations.
pub type DbwardResult<T> = Result<T, DbwardError>;
