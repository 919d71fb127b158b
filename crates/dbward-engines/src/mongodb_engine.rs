//! MongoDB via `mongodump` / `mongorestore` archives.

use crate::engine::DatabaseEngine;
use crate::options::{extra_options, require_database, require_host};
use crate::target::EngineTarget;
use async_trait::async_trait;
use dbward_core::{EngineKind, EngineResult, LogLevel, OperationLogger, escape, escape_path};
use std::path::Path;

/// Extra param naming the authentication database
const AUTH_SOURCE_PARAM: &str = "auth_source";
const DEFAULT_AUTH_SOURCE: &str = "admin";

#[derive(Debug, Clone, Default)]
pub struct MongoDbEngine;

impl MongoDbEngine {
    pub fn new() -> Self {
        Self
    }

    fn connection_args(&self, target: &EngineTarget) -> String {
        let mut args = format!(
            "--host={} --port={}",
            escape(&target.host),
            escape(&target.port.to_string())
        );
        if !target.username.is_empty() {
            let auth_source = target
                .extra_params
                .get(AUTH_SOURCE_PARAM)
                .map(String::as_str)
                .unwrap_or(DEFAULT_AUTH_SOURCE);
            args.push_str(&format!(" --username={}", escape(&target.username)));
            if !target.password().is_empty() {
                args.push_str(&format!(" --password={}", escape(target.password())));
            }
            args.push_str(&format!(" --authenticationDatabase={}", escape(auth_source)));
        }
        args
    }
}

#[async_trait]
impl DatabaseEngine for MongoDbEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::MongoDb
    }

    fn dump_extension(&self) -> &'static str {
        "archive"
    }

    fn dump_command(&self, target: &EngineTarget, output: &Path) -> EngineResult<String> {
        require_host(target)?;
        require_database(target)?;
        Ok(format!(
            "mongodump {} --db={}{} --archive={}",
            self.connection_args(target),
            escape(&target.database),
            extra_options(target, &[AUTH_SOURCE_PARAM])?,
            escape_path(output)
        ))
    }

    /// Remaps every namespace of the source database onto the target database
    fn restore_command(&self, target: &EngineTarget, input: &Path) -> EngineResult<String> {
        require_host(target)?;
        require_database(target)?;
        let source = target
            .source_database
            .as_deref()
            .unwrap_or(&target.database);
        Ok(format!(
            "mongorestore {} --archive={} --nsFrom={} --nsTo={} --drop",
            self.connection_args(target),
            escape_path(input),
            escape(&format!("{}.*", source)),
            escape(&format!("{}.*", target.database))
        ))
    }

    fn test_command(&self, target: &EngineTarget) -> EngineResult<String> {
        require_host(target)?;
        Ok(format!(
            "mongosh --quiet {} --eval {}",
            self.connection_args(target),
            escape("db.runCommand({ ping: 1 })")
        ))
    }

    /// `--drop` alone would keep collections that exist only in the target
    fn prepare_command(&self, target: &EngineTarget) -> EngineResult<Option<String>> {
        require_host(target)?;
        require_database(target)?;
        let database = serde_json::Value::from(target.database.as_str()).to_string();
        Ok(Some(format!(
            "mongosh --quiet {} --eval {}",
            self.connection_args(target),
            escape(&format!("db.getSiblingDB({}).dropDatabase()", database))
        )))
    }

    async fn prepare_for_restore(
        &self,
        target: &EngineTarget,
        logger: &dyn OperationLogger,
    ) -> EngineResult<()> {
        logger.log(
            &format!("Dropped database {}", target.database),
            LogLevel::Info,
            None,
        );
        Ok(())
    }
}
