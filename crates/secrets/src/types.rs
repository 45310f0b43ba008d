//! Secret names and fetched records
//!
//! - [`SecretName`]: a validated, trimmed vault identifier
//! - [`SecureSecret`]: a wrapper around `secrecy::SecretString` that auto-zeros on drop
//! - [`SecretRecord`]: a fetched secret (canonical name + value)

use crate::SecretError;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A secret identifier read from the name source.
///
/// Always non-empty and free of surrounding whitespace. Uniqueness is not
/// enforced; the same name may appear more than once in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecretName(String);

impl SecretName {
    /// Create a secret name, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::InvalidName`] if the trimmed name is empty.
    pub fn new(name: impl AsRef<str>) -> Result<Self, SecretError> {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(SecretError::InvalidName {
                reason: "secret name must not be empty".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SecretName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SecretName {
    type Error = SecretError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SecretName> for String {
    fn from(name: SecretName) -> Self {
        name.0
    }
}

/// A secret value with automatic memory zeroing on drop.
///
/// - Secret values are zeroed from memory when dropped
/// - Debug output shows `[REDACTED]` instead of the actual value
/// - Explicit `.expose()` call required to access the value
#[derive(Clone)]
pub struct SecureSecret {
    inner: SecretString,
}

impl SecureSecret {
    /// Create a new secure secret from a string.
    #[must_use]
    pub fn new(value: String) -> Self {
        Self {
            inner: SecretString::from(value),
        }
    }

    /// Expose the secret value for use.
    ///
    /// The caller must not log the exposed value.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.inner.expose_secret()
    }

    /// Check if the secret value is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.expose_secret().is_empty()
    }
}

impl fmt::Debug for SecureSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecureSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// The unparsed result of a successful fetch.
///
/// `name` is the canonical name reported by the vault, which may differ in
/// case from the requested [`SecretName`].
#[derive(Debug, Clone)]
pub struct SecretRecord {
    /// Canonical secret name
    pub name: String,
    /// Current secret value
    pub value: SecureSecret,
}

impl SecretRecord {
    /// Create a record from a name and a plain value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: SecureSecret::new(value.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_name_trims_whitespace() {
        let name = SecretName::new("  acme-db-password \t").unwrap();
        assert_eq!(name.as_str(), "acme-db-password");
        assert_eq!(name.to_string(), "acme-db-password");
    }

    #[test]
    fn secret_name_rejects_blank() {
        assert!(matches!(
            SecretName::new("   "),
            Err(SecretError::InvalidName { .. })
        ));
        assert!(SecretName::new("").is_err());
    }

    #[test]
    fn secret_name_deserialize_validates() {
        let ok: SecretName = serde_json::from_str("\" tenant-a \"").unwrap();
        assert_eq!(ok.as_str(), "tenant-a");

        let err = serde_json::from_str::<SecretName>("\"  \"");
        assert!(err.is_err());
    }

    #[test]
    fn secure_secret_debug_is_redacted() {
        let secret = SecureSecret::new("my-super-secret-password".to_string());
        let debug_output = format!("{secret:?}");
        assert_eq!(debug_output, "[REDACTED]");
        assert!(!debug_output.contains("password"));
    }

    #[test]
    fn secure_secret_display_is_redacted() {
        let secret = SecureSecret::new("my-super-secret-password".to_string());
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn secure_secret_expose_returns_value() {
        let secret = SecureSecret::new("test-value".to_string());
        assert_eq!(secret.expose(), "test-value");
        assert!(!secret.is_empty());
    }

    #[test]
    fn secret_record_debug_hides_value() {
        let record = SecretRecord::new("acme-conn", "Password=hunter2");
        let debug_output = format!("{record:?}");
        assert!(debug_output.contains("acme-conn"));
        assert!(!debug_output.contains("hunter2"));
    }
}
