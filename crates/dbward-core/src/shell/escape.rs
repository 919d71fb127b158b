use std::path::Path;

/// Quote one shell argument.
///
/// The value is wrapped in single quotes and each embedded `'` is rendered as
/// `'\''`, so no character inside the value is interpreted by `sh`.
///
/// ```rust
/// use dbward_core::escape;
///
/// assert_eq!(escape("app"), "'app'");
/// assert_eq!(escape("it's"), r"'it'\''s'");
/// assert_eq!(escape(""), "''");
/// ```
pub fn escape(arg: &str) -> String {
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('\'');
    for c in arg.chars() {
        if c == '\'' {
            quoted.push_str(r"'\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

/// Quote a filesystem path; non-UTF-8 bytes are replaced lossily.
pub fn escape_path(path: &Path) -> String {
    escape(&path.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_neutralizes_metacharacters() {
        assert_eq!(escape("$(rm -rf /)"), "'$(rm -rf /)'");
        assert_eq!(escape("a;b|c&&d"), "'a;b|c&&d'");
        assert_eq!(escape("`id`"), "'`id`'");
        assert_eq!(escape("''"), r"''\'''\'''");
    }

    #[test]
    fn test_escape_path() {
        assert_eq!(escape_path(Path::new("/data/app.sqlite")), "'/data/app.sqlite'");
        assert_eq!(escape_path(Path::new("/tmp/o'brien")), r"'/tmp/o'\''brien'");
    }

    #[test]
    fn test_escape_roundtrips_through_word_splitting() {
        for arg in ["plain", "with space", "quote'inside", "dbl\"q", "back\\slash", "new\nline"] {
            let words = shell_words::split(&escape(arg)).unwrap();
            assert_eq!(words, vec![arg.to_string()]);
        }
    }
}
