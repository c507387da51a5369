//! Credential bundle
//!
//! The single versioned object holding all of a team's secret material.
//! The bundle is only ever read and written whole (read-modify-write), so
//! a partial update can never leave mixed versions behind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Well-known bundle key for the self-owned webhook verification secret.
pub const WEBHOOK_SECRET_KEY: &str = "webhook_secret";

/// Versioned map of a team's named secrets
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct CredentialBundle {
    /// Monotonic version, incremented exactly once per write
    pub version: u64,

    /// Flat string-keyed secret map (`github_token`, `webhook_secret`,
    /// `slack_webhook_url`, `cost_api_key`, ...)
    pub secrets: BTreeMap<String, String>,
}

impl CredentialBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay only the provided keys onto this bundle, bumping the
    /// version exactly once. Keys not mentioned retain their prior values.
    pub fn merged(&self, updates: BTreeMap<String, String>) -> Self {
        let mut secrets = self.secrets.clone();
        secrets.extend(updates);
        Self {
            version: self.version + 1,
            secrets,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.secrets.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.secrets.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

// Secret values must never reach logs. Debug prints key names only.
impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("version", &self.version)
            .field("keys", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_overlays_only_given_keys() {
        let mut bundle = CredentialBundle::new();
        bundle.secrets.insert("github_token".into(), "ghp_old".into());
        bundle.secrets.insert("cost_api_key".into(), "ck_1".into());
        bundle.version = 3;

        let merged = bundle.merged(BTreeMap::from([(
            "github_token".to_string(),
            "ghp_new".to_string(),
        )]));

        assert_eq!(merged.version, 4);
        assert_eq!(merged.get("github_token"), Some("ghp_new"));
        assert_eq!(merged.get("cost_api_key"), Some("ck_1"));
    }

    #[test]
    fn test_debug_redacts_values() {
        let mut bundle = CredentialBundle::new();
        bundle
            .secrets
            .insert("github_token".into(), "ghp_supersecret".into());

        let rendered = format!("{:?}", bundle);
        assert!(rendered.contains("github_token"));
        assert!(!rendered.contains("ghp_supersecret"));
    }
}
