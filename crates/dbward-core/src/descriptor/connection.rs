use super::ssh::SshDescriptor;
use crate::error::SpecError;
use crate::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Supported database engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    MySql,
    MariaDb,
    #[serde(alias = "postgres")]
    PostgreSql,
    Sqlite,
    Redis,
    MongoDb,
    Firebird,
}

impl EngineKind {
    /// All engine kinds, in declaration order
    pub const ALL: [EngineKind; 7] = [
        EngineKind::MySql,
        EngineKind::MariaDb,
        EngineKind::PostgreSql,
        EngineKind::Sqlite,
        EngineKind::Redis,
        EngineKind::MongoDb,
        EngineKind::Firebird,
    ];

    /// Engines whose "database" is a file on the local filesystem.
    ///
    /// These never go through an SSH tunnel.
    pub fn is_local_file(&self) -> bool {
        matches!(self, EngineKind::Sqlite)
    }

    /// Default server port, or 0 for file-based engines
    pub fn default_port(&self) -> u16 {
        match self {
            EngineKind::MySql | EngineKind::MariaDb => 3306,
            EngineKind::PostgreSql => 5432,
            EngineKind::Sqlite => 0,
            EngineKind::Redis => 6379,
            EngineKind::MongoDb => 27017,
            EngineKind::Firebird => 3050,
        }
    }

    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::MySql => "mysql",
            EngineKind::MariaDb => "mariadb",
            EngineKind::PostgreSql => "postgresql",
            EngineKind::Sqlite => "sqlite",
            EngineKind::Redis => "redis",
            EngineKind::MongoDb => "mongodb",
            EngineKind::Firebird => "firebird",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(EngineKind::MySql),
            "mariadb" => Ok(EngineKind::MariaDb),
            "postgresql" | "postgres" => Ok(EngineKind::PostgreSql),
            "sqlite" => Ok(EngineKind::Sqlite),
            "redis" => Ok(EngineKind::Redis),
            "mongodb" => Ok(EngineKind::MongoDb),
            "firebird" => Ok(EngineKind::Firebird),
            other => Err(SpecError::invalid(
                "engine",
                format!("unknown engine kind '{}'", other),
            )),
        }
    }
}

/// How to reach one database server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub engine: EngineKind,
    /// Human-facing server label, used for artifact naming
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub host: String,
    /// 0 means the engine's default port
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Additional dump-tool long options (`--key=value`, empty value for a bare flag)
    #[serde(default)]
    pub extra_params: BTreeMap<String, String>,
    #[serde(default)]
    pub ssh: Option<SshDescriptor>,
}

impl ConnectionDescriptor {
    /// Create a descriptor with defaults for everything but the engine and host
    pub fn new(engine: EngineKind, host: impl Into<String>) -> Self {
        Self {
            engine,
            server_name: String::new(),
            host: host.into(),
            port: 0,
            username: String::new(),
            password: None,
            extra_params: BTreeMap::new(),
            ssh: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<SecretString>,
    ) -> Self {
        self.username = username.into();
        self.password = Some(password.into());
        self
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = name.into();
        self
    }

    pub fn with_ssh(mut self, ssh: SshDescriptor) -> Self {
        self.ssh = Some(ssh);
        self
    }

    pub fn with_extra_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    /// A tunnel is needed iff the engine talks over the network and SSH is configured
    pub fn requires_tunnel(&self) -> bool {
        !self.engine.is_local_file() && self.ssh.is_some()
    }

    /// Port to connect to, falling back to the engine default
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            self.engine.default_port()
        } else {
            self.port
        }
    }

    /// Validate fields that end up inside shell command lines
    pub fn validate(&self) -> Result<(), SpecError> {
        if !self.engine.is_local_file() && self.host.trim().is_empty() {
            return Err(SpecError::invalid("host", "host cannot be empty"));
        }

        for key in self.extra_params.keys() {
            if !is_option_key(key) {
                return Err(SpecError::invalid(
                    "extra_params",
                    format!("'{}' is not a valid option name", key),
                ));
            }
        }

        if let Some(ssh) = &self.ssh {
            ssh.validate()?;
        }

        Ok(())
    }
}

/// Option names are interpolated unescaped after `--`, so keep them boring
pub fn is_option_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{SshAuth, SshDescriptor};

    #[test]
    fn test_requires_tunnel_only_for_network_engines_with_ssh() {
        let ssh = SshDescriptor::new("bastion", "deploy", SshAuth::password("pw"));

        let pg = ConnectionDescriptor::new(EngineKind::PostgreSql, "10.0.0.5");
        assert!(!pg.requires_tunnel());
        assert!(pg.clone().with_ssh(ssh.clone()).requires_tunnel());

        let sqlite = ConnectionDescriptor::new(EngineKind::Sqlite, "").with_ssh(ssh);
        assert!(!sqlite.requires_tunnel());
    }

    #[test]
    fn test_effective_port_defaults() {
        let conn = ConnectionDescriptor::new(EngineKind::MySql, "db");
        assert_eq!(conn.effective_port(), 3306);
        assert_eq!(conn.with_port(3307).effective_port(), 3307);
    }

    #[test]
    fn test_engine_kind_parse_and_serde() {
        assert_eq!("postgres".parse::<EngineKind>().unwrap(), EngineKind::PostgreSql);
        assert_eq!("MariaDB".parse::<EngineKind>().unwrap(), EngineKind::MariaDb);
        assert!("oracle".parse::<EngineKind>().is_err());

        let kind: EngineKind = serde_json::from_str("\"mongodb\"").unwrap();
        assert_eq!(kind, EngineKind::MongoDb);
        assert_eq!(serde_json::to_string(&EngineKind::PostgreSql).unwrap(), "\"postgresql\"");
    }

    #[test]
    fn test_extra_param_keys_validated() {
        let ok = ConnectionDescriptor::new(EngineKind::MySql, "db").with_extra_param("max_allowed_packet", "1G");
        assert!(ok.validate().is_ok());

        let bad = ConnectionDescriptor::new(EngineKind::MySql, "db").with_extra_param("x; rm -rf /", "");
        assert!(bad.validate().is_err());

        let leading_dash = ConnectionDescriptor::new(EngineKind::MySql, "db").with_extra_param("-x", "");
        assert!(leading_dash.validate().is_err());
    }
}
