//! Normalized identity keys.

use std::fmt;

use crate::error::{QauthError, Result};

/// Lower-cased, trimmed identity (usually an email address).
///
/// Two spellings that differ only in case or surrounding whitespace map to
/// the same identity, and therefore to the same stored secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    /// Normalize raw user input into an identity.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(QauthError::InvalidInput(
                "identity must not be empty".to_string(),
            ));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Identity {
    type Err = QauthError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let id = Identity::parse("  Alice@Example.COM \n").unwrap();
        assert_eq!(id.as_str(), "alice@example.com");
        assert_eq!(id, Identity::parse("alice@example.com").unwrap());
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert!(matches!(
            Identity::parse("   "),
            Err(QauthError::InvalidInput(_))
        ));
    }
}
