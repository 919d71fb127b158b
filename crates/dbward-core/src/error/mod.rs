//! Error Types
//!
//! Each concern reports through its own enum so callers deep in the stack can
//! match on exactly what they handle. Everything converges into
//! [`DbwardError`], the taxonomy surfaced by the pipelines:
//!
//! - `shell`: child process failures and timeouts
//! - `engine`: command provider and direct-connectivity failures
//! - `storage`: volume resolution and transfer failures
//! - `tunnel`: SSH port forwarding failures
//! - `spec`: rejected descriptors
//! - `config`: runtime configuration loading
//! - `conversions`: the flattened top-level error and its `From` impls

mod config;
mod conversions;
mod engine;
mod shell;
mod spec;
mod storage;
mod tunnel;

pub use config::ConfigError;
pub use conversions::{DbwardError, DbwardResult};
pub use engine::{EngineError, EngineOperation, EngineResult};
pub use shell::ShellError;
pub use spec::SpecError;
pub use storage::{StorageError, StorageResult};
pub use tunnel::TunnelError;
