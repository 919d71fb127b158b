//! Dump, compress, checksum and upload one database.

use crate::checksum::digest_file;
use crate::compression::Compressor;
use crate::context::PipelineContext;
use crate::routing::route_through_tunnel;
use crate::workdir::WorkingDir;
use chrono::{DateTime, Utc};
use dbward_core::sanitization::SanitizeIdentifier;
use dbward_core::{
    BackupOutcome, BackupSpec, DbwardError, DbwardResult, LogLevel, OperationLogger,
};
use dbward_engines::{EngineCommands, EngineTarget};
use dbward_storage::{StorageHandle, join_path, normalize_path, upload_file};
use dbward_tunnel::SshTunnel;
use std::path::Path;

/// Timestamp embedded in generated artifact names
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Produces a compressed, checksummed artifact from a live database and
/// places it on a volume.
///
/// ```rust,no_run
/// use dbward::{BackupPipeline, PipelineContext};
/// use dbward_core::{BackupSpec, ConnectionDescriptor, EngineKind, TracingLogger, VolumeDescriptor};
///
/// # async fn run() -> dbward_core::DbwardResult<()> {
/// let spec = BackupSpec {
///     connection: ConnectionDescriptor::new(EngineKind::PostgreSql, "db.internal")
///         .with_credentials("backup", "secret"),
///     volume: VolumeDescriptor::local("nightly", "/srv/backups"),
///     database: "app".into(),
///     working_dir: "/var/tmp".into(),
///     destination_path: Some("postgres".into()),
///     compression: Default::default(),
///     artifact_name: None,
/// };
/// let outcome = BackupPipeline::new(PipelineContext::default())
///     .run(&spec, &TracingLogger)
///     .await?;
/// println!("{} ({} bytes, sha256 {})", outcome.filename, outcome.size, outcome.checksum);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BackupPipeline {
    context: PipelineContext,
}

impl BackupPipeline {
    pub fn new(context: PipelineContext) -> Self {
        Self { context }
    }

    /// Run one backup. The tunnel and working directory are torn down
    /// whether or not it succeeds.
    #[tracing::instrument(
        skip(self, spec, logger),
        fields(engine = %spec.connection.engine, volume = %spec.volume.name)
    )]
    pub async fn run(
        &self,
        spec: &BackupSpec,
        logger: &dyn OperationLogger,
    ) -> DbwardResult<BackupOutcome> {
        spec.validate()?;
        let commands = self
            .context
            .engines()
            .commands_for(EngineTarget::from_connection(&spec.connection, &spec.database))?;
        let storage = self.context.storage().resolve(&spec.volume).await?;

        logger.log(
            "Backup started",
            LogLevel::Info,
            Some(serde_json::json!({
                "engine": spec.connection.engine,
                "server": spec.connection.server_name,
                "database": spec.database,
                "volume": spec.volume.name,
                "compression": spec.compression.kind,
            })),
        );

        let workdir = WorkingDir::create(&spec.working_dir).await?;
        let mut tunnel = SshTunnel::new(self.context.config().ssh.clone());

        let result = self
            .execute(spec, commands, storage.as_ref(), &workdir, &mut tunnel, logger)
            .await;

        tunnel.close_logged(logger).await;
        workdir.close();

        match &result {
            Ok(outcome) => {
                tracing::info!(filename = %outcome.filename, size = outcome.size, "Backup completed");
                logger.log(
                    "Backup completed",
                    LogLevel::Info,
                    Some(serde_json::to_value(outcome).unwrap_or_default()),
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "Backup failed");
                logger.log(&format!("Backup failed: {}", e), LogLevel::Error, None);
            }
        }
        result
    }

    async fn execute(
        &self,
        spec: &BackupSpec,
        commands: EngineCommands,
        storage: &dyn StorageHandle,
        workdir: &WorkingDir,
        tunnel: &mut SshTunnel,
        logger: &dyn OperationLogger,
    ) -> DbwardResult<BackupOutcome> {
        let commands = route_through_tunnel(&spec.connection, tunnel, commands, logger).await?;

        let base = artifact_base_name(spec, Utc::now());
        let raw = workdir.file(&format!("{}.{}", base, commands.dump_extension()));
        commands.dump(&raw, logger).await?;

        let compressor = Compressor::new(spec.compression, &self.context.config().compression);
        let artifact = compressor
            .compress(self.context.executor(), &raw, logger)
            .await?;
        let digest = digest_file(&artifact).await?;

        let file_name = artifact
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let remote = normalize_path(&join_path(spec.destination_path.as_deref(), &file_name))?;
        let written = upload_file(storage, &artifact, &remote).await?;
        if written != digest.size {
            return Err(DbwardError::SizeMismatch {
                filename: remote,
                expected: digest.size,
                actual: written,
            });
        }

        Ok(BackupOutcome {
            filename: remote,
            size: digest.size,
            checksum: digest.sha256,
        })
    }
}

/// `<server>-<database>-<UTC timestamp>`, or the name the caller chose.
///
/// The server falls back to the engine name; file-based databases
/// contribute their file stem.
pub fn artifact_base_name(spec: &BackupSpec, at: DateTime<Utc>) -> String {
    if let Some(name) = &spec.artifact_name {
        return name.clone();
    }

    let server = match spec.connection.server_name.trim() {
        "" => spec.connection.engine.as_str(),
        name => name,
    };
    let database = if spec.connection.engine.is_local_file() {
        Path::new(&spec.database)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| spec.database.clone())
    } else {
        spec.database.clone()
    };

    format!(
        "{}-{}-{}",
        server.sanitize_identifier(),
        database.sanitize_identifier(),
        at.format(TIMESTAMP_FORMAT)
    )
}
