//! Credential wrapper
//!
//! Passwords, private keys and passphrases travel through descriptors as
//! [`SecretString`]. The value is only reachable through [`SecretString::expose`];
//! `Debug`, `Display` and `Serialize` all render a mask, and the buffer is
//! zeroized when dropped.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Mask rendered in place of any secret value
pub const SECRET_MASK: &str = "***";

/// A string holding credential material
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw secret
    ///
    /// Callers must not log or format the returned value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString({})", SECRET_MASK)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SECRET_MASK)
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(SECRET_MASK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_mask_value() {
        let secret = SecretString::new("hunter2");
        assert_eq!(format!("{:?}", secret), "SecretString(***)");
        assert_eq!(secret.to_string(), "***");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_serialize_masks_deserialize_reads() {
        let secret: SecretString = serde_json::from_str("\"hunter2\"").unwrap();
        assert_eq!(secret.expose(), "hunter2");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"***\"");
    }
}
