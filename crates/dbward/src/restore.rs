//! Download, verify, decompress and replay one artifact into a fresh schema.
//!
//! A restore is destructive and attempted exactly once. Everything that can
//! be checked without touching the target (engine kinds, command support,
//! connectivity, artifact integrity) is checked before the schema is dropped.

use crate::checksum::{digest_file, same_digest};
use crate::compression::Compressor;
use crate::context::PipelineContext;
use crate::routing::route_through_tunnel;
use crate::workdir::WorkingDir;
use dbward_core::sanitization::SanitizeIdentifier;
use dbward_core::{
    ArtifactRef, CompressionKind, DbwardError, DbwardResult, EngineKind, LogLevel,
    OperationLogger, RestoreSpec,
};
use dbward_engines::{EngineCommands, EngineTarget};
use dbward_storage::{StorageHandle, download_file, normalize_path};
use dbward_tunnel::SshTunnel;
use std::path::{Path, PathBuf};

/// Artifacts only restore into the engine kind that produced them
pub fn check_engines(source: EngineKind, target: EngineKind) -> DbwardResult<()> {
    if source == target {
        Ok(())
    } else {
        Err(DbwardError::EngineMismatch {
            source_engine: source,
            target_engine: target,
        })
    }
}

/// Working files of one restore
#[derive(Debug)]
struct RestoreFiles {
    /// Compressed artifact as downloaded
    artifact: PathBuf,
    /// Decompressed dump handed to the engine
    dump: PathBuf,
}

impl RestoreFiles {
    fn new(workdir: &WorkingDir, remote: &str, compression: CompressionKind) -> Self {
        let name = Path::new(remote)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());
        let suffix = format!(".{}", compression.extension());
        // Sanitizing may truncate, so the extension is split off first
        let (artifact, dump) = match name.strip_suffix(&suffix) {
            Some(stem) if !stem.is_empty() => {
                let stem = stem.sanitize_identifier();
                (format!("{}{}", stem, suffix), stem)
            }
            _ => {
                let name = name.sanitize_identifier();
                (name.clone(), format!("{}.raw", name))
            }
        };
        Self {
            artifact: workdir.file(&artifact),
            dump: workdir.file(&dump),
        }
    }
}

/// Restores artifacts written by [`BackupPipeline`](crate::BackupPipeline).
#[derive(Debug, Clone)]
pub struct RestorePipeline {
    context: PipelineContext,
}

impl RestorePipeline {
    pub fn new(context: PipelineContext) -> Self {
        Self { context }
    }

    /// Run one restore. Failure is terminal for the invocation; the tunnel
    /// and every downloaded or decompressed file are removed regardless.
    #[tracing::instrument(
        skip(self, spec, logger),
        fields(
            engine = %spec.target.engine,
            artifact = %spec.artifact.filename,
            schema = %spec.destination_schema
        )
    )]
    pub async fn run(&self, spec: &RestoreSpec, logger: &dyn OperationLogger) -> DbwardResult<()> {
        check_engines(spec.source_engine, spec.target.engine)?;
        spec.validate()?;
        let remote = normalize_path(&spec.artifact.filename)?;

        let target = EngineTarget::from_connection(&spec.target, &spec.destination_schema)
            .with_source_database(&spec.source_database);
        let commands = self.context.engines().commands_for(target)?;
        let storage = self.context.storage().resolve(&spec.volume).await?;

        logger.log(
            "Restore started",
            LogLevel::Info,
            Some(serde_json::json!({
                "engine": spec.target.engine,
                "artifact": remote,
                "volume": spec.volume.name,
                "source_database": spec.source_database,
                "destination_schema": spec.destination_schema,
            })),
        );

        let workdir = WorkingDir::create(&spec.working_dir).await?;
        let files = RestoreFiles::new(&workdir, &remote, spec.compression);
        let mut tunnel = SshTunnel::new(self.context.config().ssh.clone());

        let result = self
            .execute(spec, &remote, commands, storage.as_ref(), &files, &workdir, &mut tunnel, logger)
            .await;

        workdir.discard(&files.artifact).await;
        workdir.discard(&files.dump).await;
        tunnel.close_logged(logger).await;
        workdir.close();

        match &result {
            Ok(()) => {
                tracing::info!("Restore completed");
                logger.log("Restore completed", LogLevel::Info, None);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Restore failed");
                logger.log(&format!("Restore failed: {}", e), LogLevel::Error, None);
            }
        }
        result
    }

    async fn execute(
        &self,
        spec: &RestoreSpec,
        remote: &str,
        commands: EngineCommands,
        storage: &dyn StorageHandle,
        files: &RestoreFiles,
        workdir: &WorkingDir,
        tunnel: &mut SshTunnel,
        logger: &dyn OperationLogger,
    ) -> DbwardResult<()> {
        // Unsupported restores fail here, before the target is contacted
        let compressor = Compressor::for_kind(spec.compression, &self.context.config().compression);
        commands.restore_command(&files.dump)?;
        compressor.decompress_command(&files.artifact, &files.dump)?;

        let commands = route_through_tunnel(&spec.target, tunnel, commands, logger).await?;
        self.check_connectivity(&commands, logger).await?;

        let read = download_file(storage, remote, &files.artifact).await?;
        verify_artifact(&spec.artifact, remote, &files.artifact, read).await?;

        compressor
            .decompress(self.context.executor(), &files.artifact, &files.dump, logger)
            .await?;
        workdir.discard(&files.artifact).await;

        commands
            .prepare_for_restore(&spec.destination_schema, logger)
            .await?;
        commands.restore(&files.dump, logger).await?;
        Ok(())
    }

    /// Pre-flight check against the (possibly tunneled) target.
    ///
    /// File-based engines restore into a path that usually does not exist
    /// yet, so for them only the parent directory is checked.
    async fn check_connectivity(
        &self,
        commands: &EngineCommands,
        logger: &dyn OperationLogger,
    ) -> DbwardResult<()> {
        let target = commands.target();
        if target.engine.is_local_file() {
            let parent = Path::new(&target.database)
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            return match tokio::fs::metadata(parent).await {
                Ok(meta) if meta.is_dir() => Ok(()),
                Ok(_) => Err(DbwardError::ConnectivityFailed {
                    message: format!("{} is not a directory", parent.display()),
                }),
                Err(e) => Err(DbwardError::ConnectivityFailed {
                    message: format!("{}: {}", parent.display(), e),
                }),
            };
        }

        // The destination schema may not exist yet; probe the server itself
        let probe_target = match target.engine {
            EngineKind::Firebird => target.clone(),
            _ => target.clone().with_database(""),
        };
        let probe = self
            .context
            .engines()
            .commands_for(probe_target)?
            .test_connection(logger)
            .await;
        if probe.success {
            tracing::debug!(ping_ms = probe.details.ping_ms, "Restore target reachable");
            Ok(())
        } else {
            Err(DbwardError::ConnectivityFailed {
                message: probe.message,
            })
        }
    }
}

/// Compare the downloaded file against the expected size and checksum
async fn verify_artifact(
    expected: &ArtifactRef,
    remote: &str,
    local: &Path,
    read: u64,
) -> DbwardResult<()> {
    if expected.size != 0 && expected.size != read {
        return Err(DbwardError::SizeMismatch {
            filename: remote.to_string(),
            expected: expected.size,
            actual: read,
        });
    }

    if let Some(checksum) = &expected.checksum {
        let digest = digest_file(local).await?;
        if !same_digest(checksum, &digest.sha256) {
            return Err(DbwardError::ChecksumMismatch {
                filename: remote.to_string(),
                expected: checksum.clone(),
                actual: digest.sha256,
            });
        }
    }
    Ok(())
}
