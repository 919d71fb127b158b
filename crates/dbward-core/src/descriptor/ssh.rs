use crate::error::SpecError;
use crate::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_ssh_port() -> u16 {
    22
}

/// Bastion host used to reach a private database server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshDescriptor {
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: String,
    pub auth: SshAuth,
}

/// SSH authentication material
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SshAuth {
    Password {
        password: SecretString,
    },
    Key {
        private_key: SecretString,
    },
    KeyWithPassphrase {
        private_key: SecretString,
        passphrase: SecretString,
    },
}

/// Authentication kind without the secret material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SshAuthKind {
    Password,
    Key,
    KeyWithPassphrase,
}

impl fmt::Display for SshAuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SshAuthKind::Password => write!(f, "password"),
            SshAuthKind::Key => write!(f, "key"),
            SshAuthKind::KeyWithPassphrase => write!(f, "key+passphrase"),
        }
    }
}

impl SshAuth {
    pub fn password(password: impl Into<SecretString>) -> Self {
        SshAuth::Password {
            password: password.into(),
        }
    }

    pub fn key(private_key: impl Into<SecretString>) -> Self {
        SshAuth::Key {
            private_key: private_key.into(),
        }
    }

    pub fn key_with_passphrase(
        private_key: impl Into<SecretString>,
        passphrase: impl Into<SecretString>,
    ) -> Self {
        SshAuth::KeyWithPassphrase {
            private_key: private_key.into(),
            passphrase: passphrase.into(),
        }
    }

    pub fn kind(&self) -> SshAuthKind {
        match self {
            SshAuth::Password { .. } => SshAuthKind::Password,
            SshAuth::Key { .. } => SshAuthKind::Key,
            SshAuth::KeyWithPassphrase { .. } => SshAuthKind::KeyWithPassphrase,
        }
    }
}

/// Loggable projection of an [`SshDescriptor`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SafeSshDescriptor {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth_kind: SshAuthKind,
}

impl SshDescriptor {
    pub fn new(host: impl Into<String>, username: impl Into<String>, auth: SshAuth) -> Self {
        Self {
            host: host.into(),
            port: default_ssh_port(),
            username: username.into(),
            auth,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Strip all secret material
    pub fn safe(&self) -> SafeSshDescriptor {
        SafeSshDescriptor {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            auth_kind: self.auth.kind(),
        }
    }

    /// `user@host` destination argument
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }

    pub fn validate(&self) -> Result<(), SpecError> {
        if self.host.trim().is_empty() {
            return Err(SpecError::invalid("ssh.host", "host cannot be empty"));
        }
        // ssh parses a leading dash as an option even after other arguments
        if self.host.starts_with('-') || self.username.starts_with('-') {
            return Err(SpecError::invalid(
                "ssh",
                "host and username must not start with '-'",
            ));
        }
        if self.username.trim().is_empty() {
            return Err(SpecError::invalid("ssh.username", "username cannot be empty"));
        }
        if self.port == 0 {
            return Err(SpecError::invalid("ssh.port", "port cannot be 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_projection_drops_secrets() {
        let ssh = SshDescriptor::new(
            "bastion.example.com",
            "deploy",
            SshAuth::key_with_passphrase("-----BEGIN KEY-----", "open sesame"),
        );
        let safe = ssh.safe();
        let json = serde_json::to_string(&safe).unwrap();

        assert_eq!(safe.auth_kind, SshAuthKind::KeyWithPassphrase);
        assert!(!json.contains("BEGIN KEY"));
        assert!(!json.contains("open sesame"));
        assert!(json.contains("bastion.example.com"));
    }

    #[test]
    fn test_auth_deserializes_from_tagged_form() {
        let json = r#"{"host":"b","username":"u","auth":{"kind":"password","password":"pw"}}"#;
        let ssh: SshDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(ssh.port, 22);
        assert_eq!(ssh.auth.kind(), SshAuthKind::Password);
    }

    #[test]
    fn test_validate_rejects_option_like_destination() {
        let ssh = SshDescriptor::new("-oProxyCommand=x", "u", SshAuth::password("pw"));
        assert!(ssh.validate().is_err());
    }
}
