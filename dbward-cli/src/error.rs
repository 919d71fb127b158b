use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Unsupported file format for {} (expected .json, .yaml, .yml or .toml)", path.display())]
    UnknownFormat { path: PathBuf },

    #[error(transparent)]
    Dbward(#[from] dbward::DbwardError),

    #[error(transparent)]
    Config(#[from] dbward::core::ConfigError),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}
