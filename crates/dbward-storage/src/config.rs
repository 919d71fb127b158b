//! Typed backend configs read out of a volume's config map.

use dbward_core::{StorageError, StorageResult, VolumeDescriptor};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub(crate) fn parse_config<T: DeserializeOwned>(volume: &VolumeDescriptor) -> StorageResult<T> {
    serde_json::from_value(Value::Object(volume.config.clone()))
        .map_err(|e| StorageError::invalid_config(volume.kind, e.to_string()))
}

#[cfg_attr(not(feature = "ftp"), allow(dead_code))]
pub(crate) fn default_true() -> bool {
    true
}

/// Blank strings in config maps mean "not set"
#[cfg_attr(not(any(feature = "s3", feature = "sftp")), allow(dead_code))]
pub(crate) fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbward_core::VolumeKind;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        path: String,
        #[serde(default = "default_true")]
        passive: bool,
    }

    #[test]
    fn test_parse_config_reports_kind() {
        let volume = VolumeDescriptor::new(VolumeKind::Ftp, "v");
        let err = parse_config::<Sample>(&volume).unwrap_err();
        assert!(err.to_string().contains("ftp"));
        assert!(err.to_string().contains("path"));

        let sample: Sample = parse_config(&volume.with_config("path", "/x")).unwrap();
        assert_eq!(sample.path, "/x");
        assert!(sample.passive);
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(&Some("  ".into())), None);
        assert_eq!(non_blank(&Some(" eu-west-1 ".into())), Some("eu-west-1"));
        assert_eq!(non_blank(&None), None);
    }
}
