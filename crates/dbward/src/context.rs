//! Collaborators shared by both pipelines.

use dbward_core::{DbwardConfig, ShellExecutor};
use dbward_engines::EngineRegistry;
use dbward_storage::FilesystemProvider;

/// Runtime configuration plus the engine and storage lookup tables.
///
/// Resolved once and handed to each pipeline; nothing in here is mutated
/// by a run, so one context can serve concurrent invocations.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    config: DbwardConfig,
    engines: EngineRegistry,
    storage: FilesystemProvider,
    executor: ShellExecutor,
}

impl PipelineContext {
    /// Every built-in engine and storage backend, configured from `config`
    pub fn new(config: DbwardConfig) -> Self {
        Self {
            engines: EngineRegistry::with_defaults(&config.engines),
            storage: FilesystemProvider::with_defaults(),
            executor: ShellExecutor::new(),
            config,
        }
    }

    pub fn with_engines(mut self, engines: EngineRegistry) -> Self {
        self.engines = engines.with_executor(self.executor.clone());
        self
    }

    pub fn with_storage(mut self, storage: FilesystemProvider) -> Self {
        self.storage = storage;
        self
    }

    /// Shell used for dump, restore and compression commands alike
    pub fn with_executor(mut self, executor: ShellExecutor) -> Self {
        self.engines = self.engines.with_executor(executor.clone());
        self.executor = executor;
        self
    }

    pub fn config(&self) -> &DbwardConfig {
        &self.config
    }

    pub fn engines(&self) -> &EngineRegistry {
        &self.engines
    }

    pub fn storage(&self) -> &FilesystemProvider {
        &self.storage
    }

    pub fn executor(&self) -> &ShellExecutor {
        &self.executor
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new(DbwardConfig::default())
    }
}
