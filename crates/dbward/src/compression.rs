//! External compressors driven through single shell command lines.
//!
//! | kind        | compress                                   | artifact    |
//! |-------------|--------------------------------------------|-------------|
//! | `gzip`      | `gzip -<level> -f <in>`                    | `<in>.gz`   |
//! | `zstd`      | `zstd -<level> -q -f --rm <in> -o <out>`   | `<in>.zst`  |
//! | `encrypted` | `7z a -t7z -mx=<level> -mhe=on -p<key> ...`| `<in>.7z`   |
//!
//! Every compressor removes its input, so only the artifact is left behind.

use dbward_core::{
    CompressionConfig, CompressionKind, CompressionSettings, ConfigError, DbwardResult,
    OperationLogger, SecretString, ShellExecutor, escape, escape_path,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Compressor choice bound to its level and, for encrypted archives, the key
#[derive(Debug, Clone)]
pub struct Compressor {
    kind: CompressionKind,
    level: u32,
    key: Option<SecretString>,
}

impl Compressor {
    pub fn new(settings: CompressionSettings, config: &CompressionConfig) -> Self {
        Self {
            kind: settings.kind,
            level: settings.effective_level(),
            key: config.encryption_key.clone(),
        }
    }

    /// Compressor for reading artifacts of `kind`; the level is irrelevant there
    pub fn for_kind(kind: CompressionKind, config: &CompressionConfig) -> Self {
        Self::new(
            CompressionSettings {
                kind,
                level: None,
            },
            config,
        )
    }

    pub fn kind(&self) -> CompressionKind {
        self.kind
    }

    /// Where [`compress`](Self::compress) leaves the artifact for `input`
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let mut name = OsString::from(input.as_os_str());
        name.push(".");
        name.push(self.kind.extension());
        PathBuf::from(name)
    }

    pub fn compress_command(&self, input: &Path) -> DbwardResult<String> {
        let output = self.output_path(input);
        let command = match self.kind {
            CompressionKind::Gzip => format!("gzip -{} -f {}", self.level, escape_path(input)),
            CompressionKind::Zstd => format!(
                "zstd -{} -q -f --rm {} -o {}",
                self.level,
                escape_path(input),
                escape_path(&output)
            ),
            CompressionKind::Encrypted => format!(
                "7z a -t7z -mx={} -mhe=on -p{} {} {} && rm -f {}",
                self.level,
                escape(self.key()?.expose()),
                escape_path(&output),
                escape_path(input),
                escape_path(input)
            ),
        };
        Ok(command)
    }

    pub fn decompress_command(&self, input: &Path, output: &Path) -> DbwardResult<String> {
        let command = match self.kind {
            CompressionKind::Gzip => {
                format!("gzip -d -c {} > {}", escape_path(input), escape_path(output))
            }
            CompressionKind::Zstd => format!(
                "zstd -d -q -f {} -o {}",
                escape_path(input),
                escape_path(output)
            ),
            CompressionKind::Encrypted => format!(
                "7z e -so -p{} {} > {}",
                escape(self.key()?.expose()),
                escape_path(input),
                escape_path(output)
            ),
        };
        Ok(command)
    }

    /// Compress `input` in place and return the artifact path
    pub async fn compress(
        &self,
        executor: &ShellExecutor,
        input: &Path,
        logger: &dyn OperationLogger,
    ) -> DbwardResult<PathBuf> {
        let command = self.compress_command(input)?;
        executor.execute(&command, logger).await?;
        Ok(self.output_path(input))
    }

    pub async fn decompress(
        &self,
        executor: &ShellExecutor,
        input: &Path,
        output: &Path,
        logger: &dyn OperationLogger,
    ) -> DbwardResult<()> {
        let command = self.decompress_command(input, output)?;
        executor.execute(&command, logger).await?;
        Ok(())
    }

    fn key(&self) -> Result<&SecretString, ConfigError> {
        self.key
            .as_ref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::Invalid {
                field: "compression.encryption_key",
                reason: "an encryption key is required for encrypted artifacts".to_string(),
            })
    }
}
