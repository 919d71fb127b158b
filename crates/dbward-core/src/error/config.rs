//! Runtime configuration loading errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// An environment override carried an unparsable value
    #[error("Invalid value for {var}: {reason}")]
    EnvOverride { var: String, reason: String },

    #[error("Invalid config value '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
