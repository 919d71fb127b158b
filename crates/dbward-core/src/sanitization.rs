//! Sanitization utilities for values that end up in file names and logs
//!
//! # Categories
//!
//! 1. **Identifier Sanitization** - Make server and database names safe for artifact file names
//! 2. **Control Character Removal** - Strip ANSI colour codes and control bytes from tool output
//! 3. **Stderr Condensing** - Collapse ssh diagnostics into a single error line
//!
//! Credential masking lives in [`crate::shell::redact`]; the helpers here never
//! look at secrets.
//!
//! # Examples
//!
//! ```rust
//! use dbward_core::sanitization::{ContentSanitizer, SanitizeIdentifier};
//!
//! assert_eq!("prod db/eu".sanitize_identifier(), "prod_db_eu");
//! assert_eq!(ContentSanitizer::sanitize_output("\x1b[32mOK\x1b[0m"), "OK");
//! ```

/// Maximum length for sanitized identifiers
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Maximum length of a condensed stderr line
pub const MAX_ERROR_LINE_LENGTH: usize = 512;

/// Trait for sanitizing strings into file-name-safe identifiers
pub trait SanitizeIdentifier {
    /// Replace anything but alphanumerics, `-`, `_` and `.` with underscores.
    ///
    /// Path separators never survive, so the result is always a single path
    /// component.
    ///
    /// ```rust
    /// use dbward_core::sanitization::SanitizeIdentifier;
    ///
    /// assert_eq!("/data/app.sqlite".sanitize_identifier(), "data_app.sqlite");
    /// assert_eq!("  ".sanitize_identifier(), "unnamed");
    /// ```
    fn sanitize_identifier(&self) -> String;
}

impl SanitizeIdentifier for str {
    fn sanitize_identifier(&self) -> String {
        let trimmed = self.trim().trim_matches('/');
        if trimmed.is_empty() {
            return "unnamed".to_string();
        }

        let sanitized: String = trimmed
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .take(MAX_IDENTIFIER_LENGTH)
            .collect();

        // "." and ".." are not usable as file name components
        if sanitized.chars().all(|c| c == '.') {
            return "unnamed".to_string();
        }
        sanitized
    }
}

impl SanitizeIdentifier for String {
    fn sanitize_identifier(&self) -> String {
        self.as_str().sanitize_identifier()
    }
}

/// Helper for sanitizing control characters in captured tool output
pub struct ContentSanitizer;

impl ContentSanitizer {
    /// Remove control characters except whitespace
    ///
    /// ```rust
    /// use dbward_core::sanitization::ContentSanitizer;
    ///
    /// assert_eq!(ContentSanitizer::remove_control_chars("a\x00b\x07"), "ab");
    /// ```
    pub fn remove_control_chars(input: &str) -> String {
        input
            .chars()
            .filter(|c| !c.is_control() || c.is_whitespace())
            .collect()
    }

    /// Remove ANSI escape sequences (ESC `[` ... final letter)
    pub fn remove_ansi_escapes(input: &str) -> String {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '\x1b' && chars.peek() == Some(&'[') {
                chars.next();
                while let Some(ch) = chars.next() {
                    if ch.is_ascii_alphabetic() {
                        break;
                    }
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Sanitize output for safe logging (removes ANSI and control chars)
    pub fn sanitize_output(input: &str) -> String {
        // ANSI first, it contains control chars
        let without_ansi = Self::remove_ansi_escapes(input);
        Self::remove_control_chars(&without_ansi)
    }

    /// Condense ssh stderr into one line.
    ///
    /// Drops `Warning:` lines (host key notices from `StrictHostKeyChecking=no`)
    /// and blank lines, joins the rest with a single space and truncates.
    ///
    /// ```rust
    /// use dbward_core::sanitization::ContentSanitizer;
    ///
    /// let stderr = "Warning: Permanently added 'b' to the list of known hosts.\r\n\
    ///               user@b: Permission denied (publickey).\n";
    /// assert_eq!(
    ///     ContentSanitizer::condense_stderr(stderr),
    ///     "user@b: Permission denied (publickey)."
    /// );
    /// ```
    pub fn condense_stderr(stderr: &str) -> String {
        let cleaned = Self::remove_ansi_escapes(stderr);
        let joined = cleaned
            .lines()
            .map(|line| Self::remove_control_chars(line).trim().to_string())
            .filter(|line| !line.is_empty() && !line.starts_with("Warning:"))
            .collect::<Vec<_>>()
            .join(" ");

        if joined.chars().count() > MAX_ERROR_LINE_LENGTH {
            let truncated: String = joined.chars().take(MAX_ERROR_LINE_LENGTH - 3).collect();
            format!("{}...", truncated)
        } else {
            joined
        }
    }
}
