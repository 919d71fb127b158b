//! Engine lookup table and bound command sets.

use crate::engine::DatabaseEngine;
use crate::firebird_engine::FirebirdEngine;
use crate::mongodb_engine::MongoDbEngine;
use crate::mysql_engine::MysqlEngine;
use crate::postgres_engine::PostgresEngine;
use crate::probe::run_probe;
use crate::redis_engine::RedisEngine;
use crate::sqlite_engine::SqliteEngine;
use crate::target::EngineTarget;
use dbward_core::{
    ConnectionTestResult, EngineError, EngineKind, EngineResult, EngineSettings, OperationLogger,
    ShellExecutor,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Maps each [`EngineKind`] to its command provider.
#[derive(Clone)]
pub struct EngineRegistry {
    engines: HashMap<EngineKind, Arc<dyn DatabaseEngine>>,
    executor: ShellExecutor,
    probe_timeout: Duration,
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.engines.keys().collect();
        kinds.sort();
        f.debug_struct("EngineRegistry")
            .field("engines", &kinds)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

impl EngineRegistry {
    /// Registry with no engines; every lookup fails with `UnsupportedEngine`
    pub fn empty(probe_timeout: Duration) -> Self {
        Self {
            engines: HashMap::new(),
            executor: ShellExecutor::new(),
            probe_timeout,
        }
    }

    /// Every built-in engine, configured from `settings`
    pub fn with_defaults(settings: &EngineSettings) -> Self {
        let timeout = settings.probe_timeout();
        let mut registry = Self::empty(timeout);
        registry.register(MysqlEngine::new(EngineKind::MySql, settings.mysql_cli, timeout));
        registry.register(MysqlEngine::new(EngineKind::MariaDb, settings.mysql_cli, timeout));
        registry.register(PostgresEngine::new(timeout));
        registry.register(SqliteEngine::new());
        registry.register(RedisEngine::new(timeout));
        registry.register(MongoDbEngine::new());
        registry.register(FirebirdEngine::new(settings.firebird_client));
        registry
    }

    /// Add or replace the provider for the engine's kind
    pub fn register<E: DatabaseEngine + 'static>(&mut self, engine: E) {
        self.engines.insert(engine.kind(), Arc::new(engine));
    }

    pub fn with_executor(mut self, executor: ShellExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn get(&self, kind: EngineKind) -> EngineResult<Arc<dyn DatabaseEngine>> {
        self.engines
            .get(&kind)
            .cloned()
            .ok_or(EngineError::UnsupportedEngine { engine: kind })
    }

    pub fn supports(&self, kind: EngineKind) -> bool {
        self.engines.contains_key(&kind)
    }

    /// Bind the provider for `target.engine` to `target`
    pub fn commands_for(&self, target: EngineTarget) -> EngineResult<EngineCommands> {
        let engine = self.get(target.engine)?;
        Ok(EngineCommands {
            engine,
            target,
            executor: self.executor.clone(),
            probe_timeout: self.probe_timeout,
        })
    }
}

/// An engine provider bound to one target.
pub struct EngineCommands {
    engine: Arc<dyn DatabaseEngine>,
    target: EngineTarget,
    executor: ShellExecutor,
    probe_timeout: Duration,
}

impl EngineCommands {
    pub fn kind(&self) -> EngineKind {
        self.engine.kind()
    }

    pub fn target(&self) -> &EngineTarget {
        &self.target
    }

    pub fn dump_extension(&self) -> &'static str {
        self.engine.dump_extension()
    }

    /// Rebind to a different target, keeping the engine
    pub fn retarget(self, target: EngineTarget) -> Self {
        Self { target, ..self }
    }

    pub fn dump_command(&self, output: &Path) -> EngineResult<String> {
        self.engine.dump_command(&self.target, output)
    }

    pub fn restore_command(&self, input: &Path) -> EngineResult<String> {
        self.engine.restore_command(&self.target, input)
    }

    pub fn test_command(&self) -> EngineResult<String> {
        self.engine.test_command(&self.target)
    }

    /// Dump the bound database into `output`
    pub async fn dump(&self, output: &Path, logger: &dyn OperationLogger) -> EngineResult<()> {
        let command = self.dump_command(output)?;
        self.executor.execute(&command, logger).await?;
        Ok(())
    }

    /// Replay `input` into the bound database
    pub async fn restore(&self, input: &Path, logger: &dyn OperationLogger) -> EngineResult<()> {
        let command = self.restore_command(input)?;
        self.executor.execute(&command, logger).await?;
        Ok(())
    }

    /// Bounded probe; failures are reported in the result, not as errors
    pub async fn test_connection(&self, logger: &dyn OperationLogger) -> ConnectionTestResult {
        match self.test_command() {
            Ok(command) => run_probe(&self.executor, &command, self.probe_timeout, logger).await,
            Err(e) => ConnectionTestResult::failure(Duration::ZERO, e.to_string()),
        }
    }

    pub fn prepare_command(&self, schema: &str) -> EngineResult<Option<String>> {
        self.engine
            .prepare_command(&self.target.clone().with_database(schema))
    }

    /// Drop and recreate `schema` on the bound server
    pub async fn prepare_for_restore(
        &self,
        schema: &str,
        logger: &dyn OperationLogger,
    ) -> EngineResult<()> {
        let target = self.target.clone().with_database(schema);
        if let Some(command) = self.engine.prepare_command(&target)? {
            self.executor.execute(&command, logger).await?;
        }
        self.engine.prepare_for_restore(&target, logger).await
    }

    pub async fn list_databases(&self, logger: &dyn OperationLogger) -> EngineResult<Vec<String>> {
        self.engine.list_databases(&self.target, logger).await
    }
}
