//! Identifier newtypes

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error returned when a team id fails slug validation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid team id {0:?}: must be 2-32 lowercase alphanumeric characters or '-', starting with a letter")]
pub struct InvalidTeamId(pub String);

/// Caller-chosen team slug, the primary key of the registry.
///
/// Immutable once created. Validated on construction so every other
/// component can trust the slug is safe to embed in resource names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(String);

impl TeamId {
    /// Parse and validate a team slug.
    pub fn new(slug: impl Into<String>) -> Result<Self, InvalidTeamId> {
        let slug = slug.into();
        let valid_len = (2..=32).contains(&slug.len());
        let valid_start = slug.chars().next().is_some_and(|c| c.is_ascii_lowercase());
        let valid_chars = slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

        if valid_len && valid_start && valid_chars && !slug.ends_with('-') {
            Ok(Self(slug))
        } else {
            Err(InvalidTeamId(slug))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TeamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for TeamId {
    type Err = InvalidTeamId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_slugs() {
        assert!(TeamId::new("payments").is_ok());
        assert!(TeamId::new("data-platform-2").is_ok());
        assert!(TeamId::new("ml").is_ok());
    }

    #[test]
    fn test_invalid_slugs() {
        assert!(TeamId::new("").is_err());
        assert!(TeamId::new("a").is_err());
        assert!(TeamId::new("Payments").is_err());
        assert!(TeamId::new("1team").is_err());
        assert!(TeamId::new("team_a").is_err());
        assert!(TeamId::new("team-").is_err());
        assert!(TeamId::new("a-very-long-team-slug-that-exceeds-the-limit").is_err());
    }
}
