//! Credential masking for command lines and captured output
//!
//! Only the secret value is replaced; the flag stays recognizable so a reader
//! of the audit log can still see which credential was passed:
//!
//! | input                  | output              |
//! |------------------------|---------------------|
//! | `--password='s3cr3t'`  | `--password=***`    |
//! | `-ps3cr3t`             | `-p***`             |
//! | `-password 's3cr3t'`   | `-password ***`     |
//! | `PGPASSWORD='s3cr3t'`  | `PGPASSWORD=***`    |
//!
//! Port flags (`-p 5432`, `--port=5432`) and hostnames that merely contain
//! `-p` are left byte-identical.

use crate::secret::SECRET_MASK;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// A single-quoted value (with `'\''` escapes), a double-quoted value, or a bare word.
const VALUE: &str = r#"'(?:[^']|'\\'')*'|"(?:[^"\\]|\\.)*"|\S+"#;

/// Environment variables that carry a credential when used as a command prefix
const SECRET_ENV_VARS: &[&str] = &[
    "PGPASSWORD",
    "MYSQL_PWD",
    "REDISCLI_AUTH",
    "ISC_PASSWORD",
    "SSHPASS",
];

static ENV_ASSIGNMENT: Lazy<Option<Regex>> = Lazy::new(|| {
    compile(&format!(
        r"\b((?:{})=)({})",
        SECRET_ENV_VARS.join("|"),
        VALUE
    ))
});

static LONG_PASSWORD: Lazy<Option<Regex>> =
    Lazy::new(|| compile(&format!(r"(--password=)({})", VALUE)));

static SPACED_PASSWORD: Lazy<Option<Regex>> =
    Lazy::new(|| compile(&format!(r"(^|\s)(-password\s+)({})", VALUE)));

static GLUED_SHORT: Lazy<Option<Regex>> =
    Lazy::new(|| compile(&format!(r"(^|\s)-p({})", VALUE)));

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::error!(error = %e, "Invalid redaction pattern");
            None
        }
    }
}

/// Mask credential values in a command line or tool output.
///
/// ```rust
/// use dbward_core::redact;
///
/// assert_eq!(
///     redact("mysqldump --host='db-primary' --port='3306' --password='hunter2' 'app'"),
///     "mysqldump --host='db-primary' --port='3306' --password=*** 'app'"
/// );
/// assert_eq!(redact("redis-cli -h 'cache' -p 6379 ping"), "redis-cli -h 'cache' -p 6379 ping");
/// ```
pub fn redact(input: &str) -> String {
    let mut text = input.to_string();

    if let Some(re) = ENV_ASSIGNMENT.as_ref() {
        text = re
            .replace_all(&text, format!("${{1}}{}", SECRET_MASK).as_str())
            .into_owned();
    }
    if let Some(re) = LONG_PASSWORD.as_ref() {
        text = re
            .replace_all(&text, format!("${{1}}{}", SECRET_MASK).as_str())
            .into_owned();
    }
    // Must run before the glued rule, which would otherwise read "-password" as "-p" + "assword"
    if let Some(re) = SPACED_PASSWORD.as_ref() {
        text = re
            .replace_all(&text, format!("${{1}}${{2}}{}", SECRET_MASK).as_str())
            .into_owned();
    }
    if let Some(re) = GLUED_SHORT.as_ref() {
        text = re
            .replace_all(&text, |caps: &Captures<'_>| {
                if caps[2].starts_with("assword") {
                    caps[0].to_string()
                } else {
                    format!("{}-p{}", &caps[1], SECRET_MASK)
                }
            })
            .into_owned();
    }

    text
}
