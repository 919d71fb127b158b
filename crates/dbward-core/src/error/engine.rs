//! Command provider and direct-connectivity errors.

use crate::descriptor::EngineKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::shell::ShellError;

/// Operations a database engine may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineOperation {
    Dump,
    Restore,
    TestConnection,
    PrepareForRestore,
    ListDatabases,
}

impl fmt::Display for EngineOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineOperation::Dump => "dump",
            EngineOperation::Restore => "restore",
            EngineOperation::TestConnection => "test_connection",
            EngineOperation::PrepareForRestore => "prepare_for_restore",
            EngineOperation::ListDatabases => "list_databases",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// No command provider is registered for the engine
    #[error("Unsupported engine: {engine}")]
    UnsupportedEngine { engine: EngineKind },

    /// The engine is known but cannot perform this operation
    #[error("Engine '{engine}' does not support {operation}")]
    UnsupportedOperation {
        engine: EngineKind,
        operation: EngineOperation,
    },

    /// The bound target cannot be expressed as a command
    #[error("Invalid target: {reason}")]
    InvalidTarget { reason: String },

    #[error(transparent)]
    Shell(#[from] ShellError),

    /// Direct driver connectivity (drop/create, listing) failed
    #[error("{engine} admin operation failed: {message}")]
    Admin { engine: EngineKind, message: String },
}

impl EngineError {
    pub fn unsupported(engine: EngineKind, operation: EngineOperation) -> Self {
        EngineError::UnsupportedOperation { engine, operation }
    }

    pub fn admin(engine: EngineKind, message: impl fmt::Display) -> Self {
        EngineError::Admin {
            engine,
            message: message.to_string(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
