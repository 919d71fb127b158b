//! Subcommand implementations over the pipelines

use crate::error::CliError;
use dbward::core::LogRecord;
use dbward::engines::{EngineCommands, EngineTarget};
use dbward::routing::route_through_tunnel;
use dbward::tunnel::{SshTunnel, test_ssh_connection};
use dbward::{
    BackupOutcome, BackupPipeline, BackupSpec, ConnectionDescriptor, ConnectionTestResult,
    DbwardError, DbwardResult, GfsPolicy, MemoryLogger, OperationLogger, PipelineContext,
    RestorePipeline, RestoreSpec, RetentionPlan, Snapshot, SshDescriptor, TracingLogger,
    plan_retention,
};
use serde::Deserialize;

/// Where audit entries go: straight to tracing, or buffered for JSON output
pub enum Audit {
    Tracing(TracingLogger),
    Memory(MemoryLogger),
}

impl Audit {
    pub fn new(buffered: bool) -> Self {
        if buffered {
            Audit::Memory(MemoryLogger::new())
        } else {
            Audit::Tracing(TracingLogger)
        }
    }

    pub fn logger(&self) -> &dyn OperationLogger {
        match self {
            Audit::Tracing(logger) => logger,
            Audit::Memory(logger) => logger,
        }
    }

    /// Buffered entries, if this audit sink buffers
    pub fn records(&self) -> Option<Vec<LogRecord>> {
        match self {
            Audit::Tracing(_) => None,
            Audit::Memory(logger) => Some(logger.records()),
        }
    }
}

/// A connection plus the database to address on it
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionFile {
    pub connection: ConnectionDescriptor,
    #[serde(default)]
    pub database: String,
}

pub async fn backup(
    context: PipelineContext,
    spec: &BackupSpec,
    logger: &dyn OperationLogger,
) -> DbwardResult<BackupOutcome> {
    BackupPipeline::new(context).run(spec, logger).await
}

pub async fn restore(
    context: PipelineContext,
    spec: &RestoreSpec,
    logger: &dyn OperationLogger,
) -> DbwardResult<()> {
    RestorePipeline::new(context).run(spec, logger).await
}

/// Run `op` against the connection, through its bastion when it has one
async fn with_commands<T, F>(
    context: &PipelineContext,
    file: &ConnectionFile,
    logger: &dyn OperationLogger,
    op: F,
) -> DbwardResult<T>
where
    F: AsyncFnOnce(EngineCommands) -> DbwardResult<T>,
{
    file.connection.validate()?;
    let commands = context
        .engines()
        .commands_for(EngineTarget::from_connection(&file.connection, &file.database))?;

    let mut tunnel = SshTunnel::new(context.config().ssh.clone());
    let result = match route_through_tunnel(&file.connection, &mut tunnel, commands, logger).await {
        Ok(commands) => op(commands).await,
        Err(e) => Err(e),
    };
    tunnel.close_logged(logger).await;
    result
}

pub async fn test_connection(
    context: &PipelineContext,
    file: &ConnectionFile,
    logger: &dyn OperationLogger,
) -> DbwardResult<ConnectionTestResult> {
    with_commands(context, file, logger, async |commands: EngineCommands| {
        Ok(commands.test_connection(logger).await)
    })
    .await
}

pub async fn list_databases(
    context: &PipelineContext,
    file: &ConnectionFile,
    logger: &dyn OperationLogger,
) -> DbwardResult<Vec<String>> {
    with_commands(context, file, logger, async |commands: EngineCommands| {
        commands
            .list_databases(logger)
            .await
            .map_err(DbwardError::from)
    })
    .await
}

pub async fn test_ssh(
    context: &PipelineContext,
    ssh: &SshDescriptor,
    logger: &dyn OperationLogger,
) -> ConnectionTestResult {
    let config = context.config();
    test_ssh_connection(ssh, &config.ssh, config.engines.probe_timeout(), logger).await
}

pub fn retention(policy: &GfsPolicy, snapshots: &[Snapshot]) -> RetentionPlan {
    plan_retention(policy, snapshots)
}

/// Result plus, when buffered, the audit trail
pub fn render<T: serde::Serialize>(result: &T, audit: &Audit) -> Result<String, CliError> {
    let value = match audit.records() {
        Some(records) => serde_json::json!({ "result": result, "log": records }),
        None => serde_json::to_value(result)?,
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbward::{EngineKind, VolumeDescriptor};

    #[tokio::test]
    async fn test_sqlite_probe_and_backup() {
        let root = tempfile::tempdir().unwrap();
        let db = root.path().join("app.db");
        std::fs::write(&db, b"SQLite format 3\0").unwrap();

        let context = PipelineContext::default();
        let audit = Audit::new(true);
        let file = ConnectionFile {
            connection: ConnectionDescriptor::new(EngineKind::Sqlite, ""),
            database: db.to_string_lossy().into_owned(),
        };

        let probe = test_connection(&context, &file, audit.logger()).await.unwrap();
        assert!(probe.success, "{}", probe.message);

        let spec = BackupSpec {
            connection: file.connection.clone(),
            volume: VolumeDescriptor::local(
                "local",
                root.path().join("volume").to_string_lossy().into_owned(),
            ),
            database: file.database.clone(),
            working_dir: root.path().join("spool"),
            destination_path: Some("sqlite".into()),
            compression: Default::default(),
            artifact_name: Some("app-manual".into()),
        };
        let outcome = backup(context, &spec, audit.logger()).await.unwrap();
        assert_eq!(outcome.filename, "sqlite/app-manual.db.gz");

        let rendered = render(&outcome, &audit).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["result"]["filename"], "sqlite/app-manual.db.gz");
        assert!(value["log"].as_array().unwrap().len() >= 3);
    }

    #[tokio::test]
    async fn test_listing_unsupported_engine() {
        let file = ConnectionFile {
            connection: ConnectionDescriptor::new(EngineKind::MongoDb, "mongo.internal"),
            database: String::new(),
        };
        let err = list_databases(&PipelineContext::default(), &file, &MemoryLogger::new())
            .await
            .unwrap_err();
        assert!(matches!(err, dbward::DbwardError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_render_without_buffer_is_bare_result() {
        let audit = Audit::new(false);
        let rendered = render(&vec!["app", "billing"], &audit).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value, serde_json::json!(["app", "billing"]));
    }
}
