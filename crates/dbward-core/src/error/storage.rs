//! Volume resolution and transfer errors.

use crate::descriptor::VolumeKind;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// No backend factory claims the volume kind
    #[error("Unsupported volume type: {kind}")]
    UnsupportedVolumeType { kind: VolumeKind },

    /// The volume config map is missing or has malformed keys
    #[error("Invalid {kind} volume config: {reason}")]
    InvalidConfig { kind: VolumeKind, reason: String },

    #[error("Object not found: {path}")]
    NotFound { path: String },

    /// The relative path escapes the volume root or is empty
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Remote service rejected the request
    #[error("{kind} backend error: {message}")]
    Backend { kind: VolumeKind, message: String },

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn invalid_config(kind: VolumeKind, reason: impl Into<String>) -> Self {
        StorageError::InvalidConfig {
            kind,
            reason: reason.into(),
        }
    }

    pub fn backend(kind: VolumeKind, message: impl fmt::Display) -> Self {
        StorageError::Backend {
            kind,
            message: message.to_string(),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
