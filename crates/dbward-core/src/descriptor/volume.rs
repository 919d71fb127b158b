use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Storage backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeKind {
    Local,
    S3,
    Sftp,
    Ftp,
}

impl fmt::Display for VolumeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeKind::Local => write!(f, "local"),
            VolumeKind::S3 => write!(f, "s3"),
            VolumeKind::Sftp => write!(f, "sftp"),
            VolumeKind::Ftp => write!(f, "ftp"),
        }
    }
}

/// A named storage destination with its decrypted backend configuration
///
/// The `config` map is interpreted by the backend registered for `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeDescriptor {
    pub kind: VolumeKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl VolumeDescriptor {
    pub fn new(kind: VolumeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            config: Map::new(),
        }
    }

    /// Local directory volume rooted at `path`
    pub fn local(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(VolumeKind::Local, name).with_config("path", Value::String(path.into()))
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}
