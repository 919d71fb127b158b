//! PostgreSQL via `pg_dump` and `psql`; admin through `tokio-postgres`.

use crate::engine::DatabaseEngine;
use crate::options::{extra_options, require_database, require_host, timeout_secs};
use crate::target::EngineTarget;
use async_trait::async_trait;
use dbward_core::{EngineKind, EngineResult, LogLevel, OperationLogger, escape, escape_path};
use std::path::Path;
use std::time::Duration;

/// Database the admin connection uses while the target is dropped
const MAINTENANCE_DATABASE: &str = "postgres";

#[derive(Debug, Clone)]
pub struct PostgresEngine {
    connect_timeout: Duration,
}

impl PostgresEngine {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    /// `PGPASSWORD='...' ` prefix, empty when no password is set
    fn password_env(&self, target: &EngineTarget) -> String {
        if target.password.is_some() {
            format!("PGPASSWORD={} ", escape(target.password()))
        } else {
            String::new()
        }
    }

    fn connection_args(&self, target: &EngineTarget, database: &str) -> String {
        let mut args = format!(
            "--host={} --port={}",
            escape(&target.host),
            escape(&target.port.to_string())
        );
        if !target.username.is_empty() {
            args.push_str(&format!(" --username={}", escape(&target.username)));
        }
        args.push_str(&format!(" --dbname={}", escape(database)));
        args
    }
}

impl Default for PostgresEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl DatabaseEngine for PostgresEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::PostgreSql
    }

    fn dump_extension(&self) -> &'static str {
        "sql"
    }

    fn dump_command(&self, target: &EngineTarget, output: &Path) -> EngineResult<String> {
        require_host(target)?;
        require_database(target)?;
        Ok(format!(
            "{}pg_dump --clean --if-exists --no-owner --no-privileges {}{} --file={}",
            self.password_env(target),
            self.connection_args(target, &target.database),
            extra_options(target, &[])?,
            escape_path(output)
        ))
    }

    fn restore_command(&self, target: &EngineTarget, input: &Path) -> EngineResult<String> {
        require_host(target)?;
        require_database(target)?;
        Ok(format!(
            "{}psql --quiet --set ON_ERROR_STOP=on {} --file={}",
            self.password_env(target),
            self.connection_args(target, &target.database),
            escape_path(input)
        ))
    }

    fn test_command(&self, target: &EngineTarget) -> EngineResult<String> {
        require_host(target)?;
        let database = if target.database.is_empty() {
            MAINTENANCE_DATABASE
        } else {
            target.database.as_str()
        };
        Ok(format!(
            "{}PGCONNECT_TIMEOUT={} psql {} --command={}",
            self.password_env(target),
            timeout_secs(self.connect_timeout),
            self.connection_args(target, database),
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
            &format!("Terminating sessions and recreating database {}", ident),
            LogLevel::Info,
            Some(serde_json::json!({ "engine": EngineKind::PostgreSql, "host": target.host })),
        );
        admin::recreate_database(self, target, &ident).await
    }

    async fn list_databases(
        &self,
        target: &EngineTarget,
        _logger: &dyn OperationLogger,
    ) -> EngineResult<Vec<String>> {
        admin::list_databases(self, target).await
    }
}

/// Double-quote an identifier, doubling embedded quotes
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(feature = "postgres")]
mod admin {
    use super::{MAINTENANCE_DATABASE, PostgresEngine};
    use crate::target::EngineTarget;
    use dbward_core::{EngineError, EngineKind, EngineResult};
    use tokio::task::JoinHandle;
    use tokio_postgres::{Client, NoTls};

    const KIND: EngineKind = EngineKind::PostgreSql;

    async fn connect(
        engine: &PostgresEngine,
        target: &EngineTarget,
    ) -> EngineResult<(Client, JoinHandle<()>)> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&target.host)
            .port(target.port)
            .dbname(MAINTENANCE_DATABASE)
            .connect_timeout(engine.connect_timeout);
        if !target.username.is_empty() {
            config.user(&target.username);
        }
        if target.password.is_some() {
            config.password(target.password());
        }

        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| EngineError::admin(KIND, e))?;

        let driver = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "PostgreSQL admin connection closed with error");
            }
        });
        Ok((client, driver))
    }

    async fn close(client: Client, driver: JoinHandle<()>) {
        drop(client);
        if let Err(e) = driver.await {
            tracing::debug!(error = %e, "PostgreSQL connection task failed");
        }
    }

    pub(super) async fn recreate_database(
        engine: &PostgresEngine,
        target: &EngineTarget,
        ident: &str,
    ) -> EngineResult<()> {
        let (client, driver) = connect(engine, target).await?;

        let result = async {
            let terminated = client
                .execute(
                    "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
                     WHERE datname = $1 AND pid <> pg_backend_pid()",
                    &[&target.database],
                )
                .await
                .map_err(|e| EngineError::admin(KIND, e))?;
            tracing::debug!(terminated, database = %target.database, "Terminated open sessions");

            client
                .batch_execute(&format!("DROP DATABASE IF EXISTS {}", ident))
                .await
                .map_err(|e| EngineError::admin(KIND, e))?;
            client
                .batch_execute(&format!("CREATE DATABASE {}", ident))
                .await
                .map_err(|e| EngineError::admin(KIND, e))?;
            Ok(())
        }
        .await;

        close(client, driver).await;
        result
    }

    pub(super) async fn list_databases(
        engine: &PostgresEngine,
        target: &EngineTarget,
    ) -> EngineResult<Vec<String>> {
        let (client, driver) = connect(engine, target).await?;
        let result = client
            .query(
                "SELECT datname FROM pg_database WHERE NOT datistemplate ORDER BY datname",
                &[],
            )
            .await
            .map_err(|e| EngineError::admin(KIND, e))
            .and_then(|rows| {
                rows.iter()
                    .map(|row| row.try_get::<_, String>(0))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| EngineError::admin(KIND, e))
            });
        close(client, driver).await;
        result
    }
}

#[cfg(not(feature = "postgres"))]
mod admin {
    use super::PostgresEngine;
    use crate::target::EngineTarget;
    use dbward_core::{EngineError, EngineKind, EngineResult};

    pub(super) async fn recreate_database(
        _engine: &PostgresEngine,
        _target: &EngineTarget,
        _ident: &str,
    ) -> EngineResult<()> {
        Err(EngineError::admin(
            EngineKind::PostgreSql,
            "built without the `postgres` feature",
        ))
    }

    pub(super) async fn list_databases(
        _engine: &PostgresEngine,
        _target: &EngineTarget,
    ) -> EngineResult<Vec<String>> {
        Err(EngineError::admin(
            EngineKind::PostgreSql,
            "built without the `postgres` feature",
        ))
    }
}
