use dbward_core::{ConnectionDescriptor, EngineKind, SecretString};
use std::collections::BTreeMap;

/// Everything an engine needs to build its command lines.
///
/// Built from a [`ConnectionDescriptor`]; when a tunnel is active the host
/// and port are rewritten to the local forwarding endpoint.
#[derive(Debug, Clone)]
pub struct EngineTarget {
    pub engine: EngineKind,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<SecretString>,
    /// Database name, or the file path for SQLite and Firebird
    pub database: String,
    pub extra_params: BTreeMap<String, String>,
    /// Database the artifact was taken from, for engines that remap on restore
    pub source_database: Option<String>,
}

impl EngineTarget {
    pub fn from_connection(connection: &ConnectionDescriptor, database: impl Into<String>) -> Self {
        Self {
            engine: connection.engine,
            host: connection.host.clone(),
            port: connection.effective_port(),
            username: connection.username.clone(),
            password: connection.password.clone(),
            database: database.into(),
            extra_params: connection.extra_params.clone(),
            source_database: None,
        }
    }

    /// Point at a different host and port, e.g. a tunnel's local endpoint
    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_source_database(mut self, source: impl Into<String>) -> Self {
        self.source_database = Some(source.into());
        self
    }

    /// Raw password, empty when none was given
    pub fn password(&self) -> &str {
        self.password.as_ref().map(|p| p.expose()).unwrap_or("")
    }

    pub fn has_password(&self) -> bool {
        self.password.as_ref().is_some_and(|p| !p.is_empty())
    }
}
