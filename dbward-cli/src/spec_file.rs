//! Spec and input files in JSON, YAML or TOML, picked by extension

use crate::error::CliError;
use serde::de::DeserializeOwned;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
    Toml,
}

fn format_of(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "json" => Some(Format::Json),
        "yaml" | "yml" => Some(Format::Yaml),
        "toml" => Some(Format::Toml),
        _ => None,
    }
}

pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let format = format_of(path).ok_or_else(|| CliError::UnknownFormat {
        path: path.to_path_buf(),
    })?;
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content, format).map_err(|message| CliError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn parse<T: DeserializeOwned>(content: &str, format: Format) -> Result<T, String> {
    match format {
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        Format::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
    }
}
