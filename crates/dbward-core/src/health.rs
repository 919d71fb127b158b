//! Connection probe results.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Measured details of a probe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeDetails {
    pub ping_ms: u64,
    /// Redacted tool output
    pub raw_output: String,
}

/// Outcome of a connectivity test.
///
/// Probes never return an error for an unreachable server; the failure is
/// described here so callers can show it next to the connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub message: String,
    pub details: ProbeDetails,
}

impl ConnectionTestResult {
    pub fn success(elapsed: Duration, raw_output: impl Into<String>) -> Self {
        Self {
            success: true,
            message: "Connection successful".to_string(),
            details: ProbeDetails {
                ping_ms: elapsed.as_millis() as u64,
                raw_output: raw_output.into(),
            },
        }
    }

    pub fn failure(elapsed: Duration, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            details: ProbeDetails {
                ping_ms: elapsed.as_millis() as u64,
                raw_output: message.clone(),
            },
            message,
        }
    }

    pub fn timed_out(timeout: Duration) -> Self {
        Self {
            success: false,
            message: format!(
                "Connection timed out after {}",
                humantime::format_duration(timeout)
            ),
            details: ProbeDetails {
                ping_ms: timeout.as_millis() as u64,
                raw_output: String::new(),
            },
        }
    }
}
