//! # dbward
//!
//! Backup and restore orchestration for databases that may only be reachable
//! through an SSH bastion.
//!
//! The two pipelines are the entry points:
//!
//! - **[`BackupPipeline`]**: tunnel, dump, compress, checksum, upload
//! - **[`RestorePipeline`]**: mismatch and connectivity checks, download,
//!   verify, decompress, recreate the schema, replay
//!
//! Both take a fully resolved spec plus an [`OperationLogger`] audit sink and
//! clean up their tunnel and working files on every exit path.
//!
//! ```rust,no_run
//! use dbward::{ArtifactRef, CompressionKind, PipelineContext, RestorePipeline, RestoreSpec};
//! use dbward::{ConnectionDescriptor, EngineKind, MemoryLogger, VolumeDescriptor};
//!
//! # async fn run() -> dbward::DbwardResult<()> {
//! let spec = RestoreSpec {
//!     target: ConnectionDescriptor::new(EngineKind::MySql, "staging-db")
//!         .with_credentials("root", "secret"),
//!     volume: VolumeDescriptor::local("nightly", "/srv/backups"),
//!     artifact: ArtifactRef {
//!         filename: "mysql/shop-20261016T040506Z.sql.gz".into(),
//!         size: 0,
//!         checksum: None,
//!     },
//!     compression: CompressionKind::Gzip,
//!     source_engine: EngineKind::MySql,
//!     source_database: "shop".into(),
//!     destination_schema: "shop_staging".into(),
//!     working_dir: "/var/tmp".into(),
//! };
//! let logger = MemoryLogger::new();
//! RestorePipeline::new(PipelineContext::default()).run(&spec, &logger).await?;
//! print!("{}", logger.transcript());
//! # Ok(())
//! # }
//! ```
//!
//! The building blocks live in their own crates and are re-exported here:
//! [`core`], [`engines`], [`storage`] and [`tunnel`].

pub mod backup;
pub mod checksum;
pub mod compression;
pub mod context;
pub mod restore;
pub mod retention;
pub mod routing;
pub mod workdir;

pub use dbward_core as core;
pub use dbward_engines as engines;
pub use dbward_storage as storage;
pub use dbward_tunnel as tunnel;

pub use backup::{BackupPipeline, artifact_base_name};
pub use checksum::{FileDigest, digest_file};
pub use compression::Compressor;
pub use context::PipelineContext;
pub use restore::{RestorePipeline, check_engines};
pub use retention::{GfsPolicy, RetentionPlan, Snapshot, plan_retention};
pub use workdir::WorkingDir;

pub use dbward_core::{
    ArtifactRef, BackupOutcome, BackupSpec, CompressionKind, CompressionSettings,
    ConnectionDescriptor, ConnectionTestResult, DbwardConfig, DbwardError, DbwardResult,
    EngineKind, LogLevel, MemoryLogger, OperationLogger, RestoreSpec, SecretString, SshAuth,
    SshDescriptor, TracingLogger, VolumeDescriptor, VolumeKind,
};
