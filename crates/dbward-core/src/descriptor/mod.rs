//! Descriptors handed to the pipelines by the caller
//!
//! Everything here is plain data resolved by the caller for a single
//! invocation: where the database lives, how to reach it, where artifacts go
//! and how they are packed. Descriptors are deserializable so the CLI (or any
//! other caller) can load them from JSON, YAML or TOML.

mod connection;
mod spec;
mod ssh;
mod volume;

pub use connection::{ConnectionDescriptor, EngineKind, is_option_key};
pub use spec::{
    ArtifactRef, BackupOutcome, BackupSpec, CompressionKind, CompressionSettings, RestoreSpec,
};
pub use ssh::{SafeSshDescriptor, SshAuth, SshAuthKind, SshDescriptor};
pub use volume::{VolumeDescriptor, VolumeKind};
