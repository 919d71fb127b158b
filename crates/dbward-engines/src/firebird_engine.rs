//! Firebird through `gbak` (binary backup) or `isql` (metadata extraction).

use crate::engine::DatabaseEngine;
use crate::options::{require_database, require_host};
use crate::target::EngineTarget;
use async_trait::async_trait;
use dbward_core::{
    EngineError, EngineKind, EngineOperation, EngineResult, FirebirdClient, LogLevel,
    OperationLogger, escape, escape_path,
};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct FirebirdEngine {
    client: FirebirdClient,
}

impl FirebirdEngine {
    pub fn new(client: FirebirdClient) -> Self {
        Self { client }
    }

    /// `host/port:path` connection string
    fn database_target(&self, target: &EngineTarget) -> String {
        format!("{}/{}:{}", target.host, target.port, target.database)
    }

    fn credentials(&self, target: &EngineTarget) -> String {
        let mut args = String::new();
        if !target.username.is_empty() {
            args.push_str(&format!(" -user {}", escape(&target.username)));
        }
        if target.password.is_some() {
            args.push_str(&format!(" -password {}", escape(target.password())));
        }
        args
    }
}

#[async_trait]
impl DatabaseEngine for FirebirdEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Firebird
    }

    fn dump_extension(&self) -> &'static str {
        match self.client {
            FirebirdClient::Gbak => "fbk",
            FirebirdClient::Isql => "sql",
        }
    }

    fn dump_command(&self, target: &EngineTarget, output: &Path) -> EngineResult<String> {
        require_host(target)?;
        require_database(target)?;
        let db = escape(&self.database_target(target));
        Ok(match self.client {
            FirebirdClient::Gbak => format!(
                "gbak -b -g{} {} {}",
                self.credentials(target),
                db,
                escape_path(output)
            ),
            FirebirdClient::Isql => format!(
                "isql -x{} {} -o {}",
                self.credentials(target),
                db,
                escape_path(output)
            ),
        })
    }

    fn restore_command(&self, target: &EngineTarget, input: &Path) -> EngineResult<String> {
        require_host(target)?;
        require_database(target)?;
        match self.client {
            FirebirdClient::Gbak => Ok(format!(
                "gbak -rep{} {} {}",
                self.credentials(target),
                escape_path(input),
                escape(&self.database_target(target))
            )),
            FirebirdClient::Isql => Err(EngineError::unsupported(
                EngineKind::Firebird,
                EngineOperation::Restore,
            )),
        }
    }

    fn test_command(&self, target: &EngineTarget) -> EngineResult<String> {
        require_host(target)?;
        require_database(target)?;
        Ok(format!(
            "printf '%s\\n' {} | isql -q{} {}",
            escape("SELECT 1 FROM RDB$DATABASE;"),
            self.credentials(target),
            escape(&self.database_target(target))
        ))
    }

    /// `gbak -rep` replaces the database file itself
    async fn prepare_for_restore(
        &self,
        target: &EngineTarget,
        logger: &dyn OperationLogger,
    ) -> EngineResult<()> {
        if self.client == FirebirdClient::Isql {
            return Err(EngineError::unsupported(
                EngineKind::Firebird,
                EngineOperation::PrepareForRestore,
            ));
        }
        logger.log(
            &format!("{} is replaced by gbak -rep", target.database),
            LogLevel::Info,
            None,
        );
        Ok(())
    }
}
