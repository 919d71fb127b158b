//! Property-Based Tests for Escaping and Credential Redaction
//!
//! Command lines are built by string interpolation, so these invariants have
//! to hold for arbitrary values, not just the handful of cases in unit tests.

use dbward_core::{escape, redact};
use proptest::prelude::*;

// Secrets carry a marker prefix so they cannot collide with surrounding text
fn secret_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("Zq[a-zA-Z0-9]{6,12}").unwrap()
}

// Secrets containing quotes, spaces and shell metacharacters
fn hostile_secret_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex(r#"[a-z0-9 '"$`;|&<>()\\*-]{1,24}"#).unwrap()
}

fn hyphen_p_host_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}-p[a-z0-9]{0,8}(\\.[a-z]{2,5})?").unwrap()
}

proptest! {
    /// Property: every supported credential form loses its value and keeps its flag
    #[test]
    fn prop_secret_never_survives(secret in secret_strategy()) {
        let forms = [
            (format!("mysqldump --password={} 'app'", escape(&secret)), "--password=***"),
            (format!("mysqldump --password={} 'app'", secret), "--password=***"),
            (format!("mysql -uroot -p{} -e 'SELECT 1'", secret), "-p***"),
            (format!("gbak -b -user 'SYSDBA' -password {} 'db.fdb' 'out'", escape(&secret)), "-password ***"),
            (format!("PGPASSWORD={} pg_dump --host='db'", escape(&secret)), "PGPASSWORD=***"),
            (format!("MYSQL_PWD={} mysql", secret), "MYSQL_PWD=***"),
            (format!("REDISCLI_AUTH={} redis-cli ping", escape(&secret)), "REDISCLI_AUTH=***"),
        ];

        for (command, mask) in forms {
            let redacted = redact(&command);
            prop_assert!(!redacted.contains(&secret), "secret leaked in {}", redacted);
            prop_assert!(redacted.contains(mask), "mask missing in {}", redacted);
        }
    }

    /// Property: an escaped value is masked as a whole, whatever it contains
    #[test]
    fn prop_escaped_hostile_value_is_masked_whole(secret in hostile_secret_strategy()) {
        let command = format!("mysqldump --password={} 'app'", escape(&secret));
        prop_assert_eq!(redact(&command), "mysqldump --password=*** 'app'");
    }

    /// Property: port flags and hostnames containing "-p" are left byte-identical
    #[test]
    fn prop_ports_and_hosts_untouched(host in hyphen_p_host_strategy(), port in 1u16..=65535) {
        let command = format!(
            "pg_dump --host={} --port={} && redis-cli -h {} -p {} ping && ssh -p {} deploy@{}",
            escape(&host), port, host, port, port, host
        );
        prop_assert_eq!(redact(&command), command);
    }

    /// Property: redaction is idempotent
    #[test]
    fn prop_redaction_idempotent(secret in secret_strategy()) {
        let command = format!("mysql -p{} --password={} -password {}", secret, secret, escape(&secret));
        let once = redact(&command);
        prop_assert_eq!(redact(&once), once);
    }

    /// Property: a POSIX word splitter recovers exactly the original argument
    #[test]
    fn prop_escape_roundtrip(arg in any::<String>()) {
        let words = shell_words::split(&escape(&arg)).unwrap();
        prop_assert_eq!(words, vec![arg]);
    }

    /// Property: escaped arguments stay separate words
    #[test]
    fn prop_escape_keeps_word_boundaries(a in any::<String>(), b in any::<String>()) {
        let line = format!("{} {}", escape(&a), escape(&b));
        let words = shell_words::split(&line).unwrap();
        prop_assert_eq!(words, vec![a, b]);
    }
}
