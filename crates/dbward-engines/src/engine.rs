use crate::target::EngineTarget;
use async_trait::async_trait;
use dbward_core::{EngineError, EngineKind, EngineOperation, EngineResult, OperationLogger};
use std::path::Path;

/// Command provider for one database engine.
///
/// The `*_command` methods are pure: they only render a command line and
/// never touch the network. The async methods connect to the server directly.
#[async_trait]
pub trait DatabaseEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Extension of raw dump files, before compression
    fn dump_extension(&self) -> &'static str;

    /// Command that writes a dump of `target.database` to `output`
    fn dump_command(&self, target: &EngineTarget, output: &Path) -> EngineResult<String>;

    /// Command that replays `input` into `target.database`
    fn restore_command(&self, target: &EngineTarget, input: &Path) -> EngineResult<String>;

    /// Cheap connectivity probe
    fn test_command(&self, target: &EngineTarget) -> EngineResult<String>;

    /// Shell command run before [`prepare_for_restore`](Self::prepare_for_restore),
    /// for engines whose reset goes through their own client
    fn prepare_command(&self, _target: &EngineTarget) -> EngineResult<Option<String>> {
        Ok(None)
    }

    /// Destructively reset `target.database` so a restore starts clean
    async fn prepare_for_restore(
        &self,
        target: &EngineTarget,
        logger: &dyn OperationLogger,
    ) -> EngineResult<()>;

    /// User databases on the server
    async fn list_databases(
        &self,
        _target: &EngineTarget,
        _logger: &dyn OperationLogger,
    ) -> EngineResult<Vec<String>> {
        Err(EngineError::unsupported(
            self.kind(),
            EngineOperation::ListDatabases,
        ))
    }
}
