//! # Runtime Configuration
//!
//! Settings resolved once per pipeline and passed down explicitly. Loaded from
//! TOML (every field has a default), then adjusted by environment variables.
//!
//! ## Environment Variables
//!
//! - `DBWARD_MYSQL_CLI` - `mysql` or `mariadb` client family (default: mariadb)
//! - `DBWARD_FIREBIRD_CLIENT` - `gbak` or `isql` (default: gbak)
//! - `DBWARD_SSH_BINARY` - ssh client binary (default: ssh)
//! - `DBWARD_PROBE_TIMEOUT` - connection probe budget, humantime syntax such as `10s` (default: 10s)
//! - `DBWARD_ENCRYPTION_KEY` - key for encrypted 7z artifacts
//!
//! ## Example
//!
//! ```toml
//! [engines]
//! mysql_cli = "mysql"
//! probe_timeout_secs = 5
//!
//! [ssh]
//! ready_max_attempts = 50
//! ```

use crate::error::ConfigError;
use crate::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Which MySQL-compatible client binaries to invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MysqlCliFamily {
    Mysql,
    #[default]
    Mariadb,
}

impl MysqlCliFamily {
    pub fn dump_binary(&self) -> &'static str {
        match self {
            MysqlCliFamily::Mysql => "mysqldump",
            MysqlCliFamily::Mariadb => "mariadb-dump",
        }
    }

    pub fn client_binary(&self) -> &'static str {
        match self {
            MysqlCliFamily::Mysql => "mysql",
            MysqlCliFamily::Mariadb => "mariadb",
        }
    }

    /// Only the MariaDB client understands `--skip_ssl`
    pub fn skips_ssl(&self) -> bool {
        matches!(self, MysqlCliFamily::Mariadb)
    }
}

impl FromStr for MysqlCliFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(MysqlCliFamily::Mysql),
            "mariadb" => Ok(MysqlCliFamily::Mariadb),
            other => Err(format!("expected 'mysql' or 'mariadb', got '{}'", other)),
        }
    }
}

/// Firebird tool used for dumps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirebirdClient {
    /// Binary backup and restore
    #[default]
    Gbak,
    /// Metadata extraction only; cannot restore
    Isql,
}

impl fmt::Display for FirebirdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirebirdClient::Gbak => write!(f, "gbak"),
            FirebirdClient::Isql => write!(f, "isql"),
        }
    }
}

impl FromStr for FirebirdClient {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gbak" => Ok(FirebirdClient::Gbak),
            "isql" => Ok(FirebirdClient::Isql),
            other => Err(format!("expected 'gbak' or 'isql', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub mysql_cli: MysqlCliFamily,
    pub firebird_client: FirebirdClient,
    pub probe_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            mysql_cli: MysqlCliFamily::default(),
            firebird_client: FirebirdClient::default(),
            probe_timeout_secs: 10,
        }
    }
}

impl EngineSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub binary: String,
    pub sshpass_binary: String,
    pub connect_timeout_secs: u64,
    pub keepalive_interval_secs: u64,
    pub ready_poll_interval_ms: u64,
    pub ready_max_attempts: u32,
    /// Where key files and askpass scripts are written; system temp dir when unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            binary: "ssh".to_string(),
            sshpass_binary: "sshpass".to_string(),
            connect_timeout_secs: 10,
            keepalive_interval_secs: 30,
            ready_poll_interval_ms: 100,
            ready_max_attempts: 300,
            temp_dir: None,
        }
    }
}

impl SshSettings {
    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    /// Total readiness budget (poll interval times attempts)
    pub fn ready_budget(&self) -> Duration {
        self.ready_poll_interval() * self.ready_max_attempts
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub encryption_key: Option<SecretString>,
}

/// Top-level runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbwardConfig {
    pub engines: EngineSettings,
    pub ssh: SshSettings,
    pub compression: CompressionConfig,
}

impl DbwardConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_toml(&content)
    }

    pub fn load_from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: DbwardConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DBWARD_*` overrides from the process environment
    pub fn apply_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides_from(std::env::vars())
    }

    /// Apply overrides from `(name, value)` pairs; unknown names are ignored
    pub fn apply_overrides_from<I, K, V>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "DBWARD_MYSQL_CLI" => {
                    self.engines.mysql_cli = value.parse().map_err(|e| invalid_env(key, e))?;
                }
                "DBWARD_FIREBIRD_CLIENT" => {
                    self.engines.firebird_client =
                        value.parse().map_err(|e| invalid_env(key, e))?;
                }
                "DBWARD_SSH_BINARY" => {
                    if value.trim().is_empty() {
                        return Err(invalid_env(key, "binary cannot be empty"));
                    }
                    self.ssh.binary = value.to_string();
                }
                "DBWARD_PROBE_TIMEOUT" => {
                    let timeout = humantime::parse_duration(value)
                        .map_err(|e| invalid_env(key, format!("invalid duration '{}': {}", value, e)))?;
                    self.engines.probe_timeout_secs = timeout.as_secs().max(1);
                }
                "DBWARD_ENCRYPTION_KEY" => {
                    self.compression.encryption_key = Some(SecretString::new(value));
                }
                _ => {}
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssh.ready_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "ssh.ready_poll_interval_ms",
                reason: "poll interval must be greater than zero".into(),
            });
        }
        if self.ssh.ready_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "ssh.ready_max_attempts",
                reason: "at least one readiness attempt is required".into(),
            });
        }
        if self.engines.probe_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "engines.probe_timeout_secs",
                reason: "probe timeout must be greater than zero".into(),
            });
        }
        if self.ssh.binary.trim().is_empty() || self.ssh.sshpass_binary.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "ssh.binary",
                reason: "ssh binaries cannot be empty".into(),
            });
        }
        Ok(())
    }
}

fn invalid_env(var: &str, reason: impl fmt::Display) -> ConfigError {
    ConfigError::EnvOverride {
        var: var.to_string(),
        reason: reason.to_string(),
    }
}
