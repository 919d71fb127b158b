//! Redis snapshots through `redis-cli --rdb`.
//!
//! An RDB file cannot be replayed through the client, so restores are not
//! supported.

use crate::engine::DatabaseEngine;
use crate::options::require_host;
use crate::target::EngineTarget;
use async_trait::async_trait;
use dbward_core::{
    EngineError, EngineKind, EngineOperation, EngineResult, OperationLogger, escape, escape_path,
};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RedisEngine {
    connect_timeout: Duration,
}

impl RedisEngine {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    fn client_prefix(&self, target: &EngineTarget) -> String {
        let mut cmd = String::new();
        if target.password.is_some() {
            cmd.push_str(&format!("REDISCLI_AUTH={} ", escape(target.password())));
        }
        cmd.push_str(&format!(
            "redis-cli -h {} -p {}",
            escape(&target.host),
            escape(&target.port.to_string())
        ));
        if !target.username.is_empty() {
            cmd.push_str(&format!(" --user {}", escape(&target.username)));
        }
        cmd.push_str(" --no-auth-warning");
        cmd
    }
}

impl Default for RedisEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl DatabaseEngine for RedisEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Redis
    }

    fn dump_extension(&self) -> &'static str {
        "rdb"
    }

    fn dump_command(&self, target: &EngineTarget, output: &Path) -> EngineResult<String> {
        require_host(target)?;
        Ok(format!(
            "{} --rdb {}",
            self.client_prefix(target),
            escape_path(output)
        ))
    }

    fn restore_command(&self, _target: &EngineTarget, _input: &Path) -> EngineResult<String> {
        Err(EngineError::unsupported(
            EngineKind::Redis,
            EngineOperation::Restore,
        ))
    }

    fn test_command(&self, target: &EngineTarget) -> EngineResult<String> {
        require_host(target)?;
        Ok(format!("{} ping", self.client_prefix(target)))
    }

    async fn prepare_for_restore(
        &self,
        _target: &EngineTarget,
        _logger: &dyn OperationLogger,
    ) -> EngineResult<()> {
        Err(EngineError::unsupported(
            EngineKind::Redis,
            EngineOperation::PrepareForRestore,
        ))
    }

    async fn list_databases(
        &self,
        target: &EngineTarget,
        _logger: &dyn OperationLogger,
    ) -> EngineResult<Vec<String>> {
        let info = admin::keyspace_info(self, target).await?;
        Ok(parse_keyspace(&info))
    }
}

/// Logical databases (`db0`, `db3`, ...) from an `INFO keyspace` reply
pub(crate) fn parse_keyspace(info: &str) -> Vec<String> {
    info.lines()
        .filter_map(|line| line.trim().split_once(':'))
        .map(|(name, _)| name)
        .filter(|name| {
            name.strip_prefix("db")
                .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        })
        .map(str::to_string)
        .collect()
}

#[cfg(feature = "redis")]
mod admin {
    use super::RedisEngine;
    use crate::target::EngineTarget;
    use dbward_core::{EngineError, EngineKind, EngineResult};
    use redis::IntoConnectionInfo;

    const KIND: EngineKind = EngineKind::Redis;

    pub(super) async fn keyspace_info(
        engine: &RedisEngine,
        target: &EngineTarget,
    ) -> EngineResult<String> {
        let mut info = (target.host.clone(), target.port)
            .into_connection_info()
            .map_err(|e| EngineError::admin(KIND, e))?;
        if !target.username.is_empty() {
            info.redis.username = Some(target.username.clone());
        }
        if target.password.is_some() {
            info.redis.password = Some(target.password().to_string());
        }

        let client = redis::Client::open(info).map_err(|e| EngineError::admin(KIND, e))?;
        let query = async {
            let mut conn = client.get_multiplexed_async_connection().await?;
            let info: String = redis::cmd("INFO")
                .arg("keyspace")
                .query_async(&mut conn)
                .await?;
            Ok::<_, redis::RedisError>(info)
        };

        match tokio::time::timeout(engine.connect_timeout, query).await {
            Ok(result) => result.map_err(|e| EngineError::admin(KIND, e)),
            Err(_) => Err(EngineError::admin(
                KIND,
                format!("connection to {}:{} timed out", target.host, target.port),
            )),
        }
    }
}

#[cfg(not(feature = "redis"))]
mod admin {
    use super::RedisEngine;
    use crate::target::EngineTarget;
    use dbward_core::{EngineError, EngineKind, EngineResult};

    pub(super) async fn keyspace_info(
        _engine: &RedisEngine,
        _target: &EngineTarget,
    ) -> EngineResult<String> {
        Err(EngineError::admin(
            EngineKind::Redis,
            "built without the `redis` feature",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keyspace() {
        let info = "# Keyspace\r\ndb0:keys=12,expires=0,avg_ttl=0\r\ndb3:keys=1,expires=1,avg_ttl=9\r\n";
        assert_eq!(parse_keyspace(info), vec!["db0", "db3"]);
        assert!(parse_keyspace("# Keyspace\r\n").is_empty());
    }
}
