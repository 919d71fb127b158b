//! SQLite databases are single files; dumps and restores are copies.

use crate::engine::DatabaseEngine;
use crate::options::require_database;
use crate::target::EngineTarget;
use async_trait::async_trait;
use dbward_core::{
    EngineError, EngineKind, EngineResult, LogLevel, OperationLogger, escape, escape_path,
};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct SqliteEngine;

impl SqliteEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseEngine for SqliteEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Sqlite
    }

    fn dump_extension(&self) -> &'static str {
        "db"
    }

    fn dump_command(&self, target: &EngineTarget, output: &Path) -> EngineResult<String> {
        require_database(target)?;
        Ok(format!(
            "cp {} {}",
            escape(&target.database),
            escape_path(output)
        ))
    }

    fn restore_command(&self, target: &EngineTarget, input: &Path) -> EngineResult<String> {
        require_database(target)?;
        let dest = escape(&target.database);
        Ok(format!(
            "cp {} {} && chmod 0640 {}",
            escape_path(input),
            dest,
            dest
        ))
    }

    fn test_command(&self, target: &EngineTarget) -> EngineResult<String> {
        require_database(target)?;
        Ok(format!("test -r {}", escape(&target.database)))
    }

    async fn prepare_for_restore(
        &self,
        target: &EngineTarget,
        logger: &dyn OperationLogger,
    ) -> EngineResult<()> {
        require_database(target)?;
        match tokio::fs::remove_file(&target.database).await {
            Ok(()) => {
                logger.log(
                    &format!("Removed existing database file {}", target.database),
                    LogLevel::Info,
                    None,
                );
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::admin(EngineKind::Sqlite, e)),
        }
    }
}
