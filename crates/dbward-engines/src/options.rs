//! Shared pieces of engine command lines.

use crate::target::EngineTarget;
use dbward_core::descriptor::is_option_key;
use dbward_core::{EngineError, EngineResult, escape};
use std::time::Duration;

/// Render `extra_params` as ` --key='value'` (bare ` --key` for empty values).
///
/// Keys listed in `consumed` are handled by the engine itself and skipped.
pub(crate) fn extra_options(target: &EngineTarget, consumed: &[&str]) -> EngineResult<String> {
    let mut rendered = String::new();
    for (key, value) in &target.extra_params {
        if consumed.contains(&key.as_str()) {
            continue;
        }
        if !is_option_key(key) {
            return Err(EngineError::InvalidTarget {
                reason: format!("'{}' is not a valid option name", key),
            });
        }
        rendered.push_str(" --");
        rendered.push_str(key);
        if !value.is_empty() {
            rendered.push('=');
            rendered.push_str(&escape(value));
        }
    }
    Ok(rendered)
}

pub(crate) fn require_database(target: &EngineTarget) -> EngineResult<()> {
    if target.database.trim().is_empty() {
        return Err(EngineError::InvalidTarget {
            reason: format!("{} target has no database", target.engine),
        });
    }
    Ok(())
}

pub(crate) fn require_host(target: &EngineTarget) -> EngineResult<()> {
    if target.host.trim().is_empty() {
        return Err(EngineError::InvalidTarget {
            reason: format!("{} target has no host", target.engine),
        });
    }
    Ok(())
}

/// Whole seconds, never below one
pub(crate) fn timeout_secs(timeout: Duration) -> u64 {
    timeout.as_secs().max(1)
}
