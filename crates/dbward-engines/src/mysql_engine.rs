//! MySQL and MariaDB via the client binaries of the configured CLI family.

use crate::engine::DatabaseEngine;
use crate::options::{extra_options, require_database, require_host};
use crate::target::EngineTarget;
use async_trait::async_trait;
use dbward_core::{
    EngineKind, EngineResult, LogLevel, MysqlCliFamily, OperationLogger, escape, escape_path,
};
use std::path::Path;
use std::time::Duration;

/// Fixed dump flags: consistent snapshot, routines, portable inserts
const DUMP_FLAGS: &str =
    "--single-transaction --routines --complete-insert --hex-blob --add-drop-table";

/// Schemas that belong to the server, never listed as user databases
const SYSTEM_SCHEMAS: &[&str] = &["information_schema", "performance_schema", "mysql", "sys"];

#[derive(Debug, Clone)]
pub struct MysqlEngine {
    kind: EngineKind,
    family: MysqlCliFamily,
    connect_timeout: Duration,
}

impl MysqlEngine {
    /// `kind` is `MySql` or `MariaDb`; the binaries come from `family` either way
    pub fn new(kind: EngineKind, family: MysqlCliFamily, connect_timeout: Duration) -> Self {
        Self {
            kind,
            family,
            connect_timeout,
        }
    }

    pub fn family(&self) -> MysqlCliFamily {
        self.family
    }

    fn ssl_flag(&self) -> &'static str {
        if self.family.skips_ssl() {
            " --skip_ssl"
        } else {
            ""
        }
    }

    fn connection_args(&self, target: &EngineTarget) -> String {
        let mut args = format!(
            "--host={} --port={}",
            escape(&target.host),
            escape(&target.port.to_string())
        );
        if !target.username.is_empty() {
            args.push_str(&format!(" --user={}", escape(&target.username)));
        }
        if target.password.is_some() {
            args.push_str(&format!(" --password={}", escape(target.password())));
        }
        args
    }
}

#[async_trait]
impl DatabaseEngine for MysqlEngine {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn dump_extension(&self) -> &'static str {
        "sql"
    }

    fn dump_command(&self, target: &EngineTarget, output: &Path) -> EngineResult<String> {
        require_host(target)?;
        require_database(target)?;
        Ok(format!(
            "{} {}{} {}{} {} > {}",
            self.family.dump_binary(),
            DUMP_FLAGS,
            self.ssl_flag(),
            self.connection_args(target),
            extra_options(target, &[])?,
            escape(&target.database),
            escape_path(output)
        ))
    }

    fn restore_command(&self, target: &EngineTarget, input: &Path) -> EngineResult<String> {
        require_host(target)?;
        require_database(target)?;
        Ok(format!(
            "{}{} {} {} < {}",
            self.family.client_binary(),
            self.ssl_flag(),
            self.connection_args(target),
            escape(&target.database),
            escape_path(input)
        ))
    }

    fn test_command(&self, target: &EngineTarget) -> EngineResult<String> {
        require_host(target)?;
        Ok(format!(
            "{}{} {} -e {}",
            self.family.client_binary(),
            self.ssl_flag(),
            self.connection_args(target),
            escape("SELECT 1")
        ))
    }

    async fn prepare_for_restore(
        &self,
        target: &EngineTarget,
        logger: &dyn OperationLogger,
    ) -> EngineResult<()> {
        require_database(target)?;
        let ident = quote_identifier(&target.database);
        logger.log(
            &format!("Recreating database {}", ident),
            LogLevel::Info,
            Some(serde_json::json!({ "engine": self.kind, "host": target.host })),
        );
        admin::recreate_database(self, target, &ident).await
    }

    async fn list_databases(
        &self,
        target: &EngineTarget,
        _logger: &dyn OperationLogger,
    ) -> EngineResult<Vec<String>> {
        let all = admin::show_databases(self, target).await?;
        Ok(all
            .into_iter()
            .filter(|name| !SYSTEM_SCHEMAS.contains(&name.to_ascii_lowercase().as_str()))
            .collect())
    }
}

/// Backtick-quote an identifier, doubling embedded backticks
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[cfg(feature = "mysql")]
mod admin {
    use super::MysqlEngine;
    use crate::target::EngineTarget;
    use dbward_core::{EngineError, EngineResult};
    use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlSslMode};
    use sqlx::{ConnectOptions, Connection, Executor, Row};

    async fn connect(engine: &MysqlEngine, target: &EngineTarget) -> EngineResult<MySqlConnection> {
        let mut options = MySqlConnectOptions::new()
            .host(&target.host)
            .port(target.port)
            .username(&target.username);
        if target.password.is_some() {
            options = options.password(target.password());
        }
        if engine.family().skips_ssl() {
            options = options.ssl_mode(MySqlSslMode::Disabled);
        }

        match tokio::time::timeout(engine.connect_timeout, options.connect()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(EngineError::admin(engine.kind, e)),
            Err(_) => Err(EngineError::admin(
                engine.kind,
                format!(
                    "connection to {}:{} timed out",
                    target.host, target.port
                ),
            )),
        }
    }

    pub(super) async fn recreate_database(
        engine: &MysqlEngine,
        target: &EngineTarget,
        ident: &str,
    ) -> EngineResult<()> {
        let mut conn = connect(engine, target).await?;
        // Plain &str statements go over the text protocol
        conn.execute(format!("DROP DATABASE IF EXISTS {}", ident).as_str())
            .await
            .map_err(|e| EngineError::admin(engine.kind, e))?;
        conn.execute(format!("CREATE DATABASE {}", ident).as_str())
            .await
            .map_err(|e| EngineError::admin(engine.kind, e))?;
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "MySQL admin connection close failed");
        }
        Ok(())
    }

    pub(super) async fn show_databases(
        engine: &MysqlEngine,
        target: &EngineTarget,
    ) -> EngineResult<Vec<String>> {
        let mut conn = connect(engine, target).await?;
        let rows = conn
            .fetch_all("SHOW DATABASES")
            .await
            .map_err(|e| EngineError::admin(engine.kind, e))?;
        let names = rows
            .iter()
            .map(|row| row.try_get::<String, _>(0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EngineError::admin(engine.kind, e))?;
        if let Err(e) = conn.close().await {
            tracing::debug!(error = %e, "MySQL admin connection close failed");
        }
        Ok(names)
    }
}

#[cfg(not(feature = "mysql"))]
mod admin {
    use super::MysqlEngine;
    use crate::target::EngineTarget;
    use dbward_core::{EngineError, EngineResult};

    pub(super) async fn recreate_database(
        engine: &MysqlEngine,
        _target: &EngineTarget,
        _ident: &str,
    ) -> EngineResult<()> {
        Err(EngineError::admin(engine.kind, "built without the `mysql` feature"))
    }

    pub(super) async fn show_databases(
        engine: &MysqlEngine,
        _target: &EngineTarget,
    ) -> EngineResult<Vec<String>> {
        Err(EngineError::admin(engine.kind, "built without the `mysql` feature"))
    }
}
