//! # dbward Core
//!
//! Shared building blocks for the dbward backup orchestration workspace:
//!
//! - **Descriptors**: connection, SSH, volume and pipeline specs handed in by the caller
//! - **Secrets**: [`SecretString`] keeps credentials out of logs and debug output
//! - **Errors**: the typed failure taxonomy every pipeline step reports through
//! - **Shell**: argument escaping, credential redaction and the [`ShellExecutor`]
//! - **Logging**: the [`OperationLogger`] port the caller's audit sink implements
//! - **Config**: runtime settings resolved once per pipeline

pub mod config;
pub mod descriptor;
pub mod error;
pub mod health;
pub mod logging;
pub mod sanitization;
pub mod secret;
pub mod shell;

pub use config::{
    CompressionConfig, DbwardConfig, EngineSettings, FirebirdClient, MysqlCliFamily, SshSettings,
};
pub use descriptor::{
    ArtifactRef, BackupOutcome, BackupSpec, CompressionKind, CompressionSettings,
    ConnectionDescriptor, EngineKind, RestoreSpec, SafeSshDescriptor, SshAuth, SshAuthKind,
    SshDescriptor, VolumeDescriptor, VolumeKind,
};
pub use error::{
    ConfigError, DbwardError, DbwardResult, EngineError, EngineOperation, EngineResult, ShellError,
    SpecError, StorageError, StorageResult, TunnelError,
};
pub use health::{ConnectionTestResult, ProbeDetails};
pub use logging::{
    CommandHandle, CommandLogEntry, CommandStatus, CommandUpdate, LogLevel, LogRecord,
    MemoryLogger, MessageEntry, OperationLogger, TracingLogger,
};
pub use secret::{SECRET_MASK, SecretString};
pub use shell::{ShellExecutor, escape, escape_path, redact};
