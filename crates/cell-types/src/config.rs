//! Organization configuration
//!
//! All components receive an explicit immutable `OrgConfig` at
//! construction. Nothing in cellkit reads ambient process state; the CLI
//! loads one TOML file and threads the struct through.

use crate::ids::TeamId;
use crate::team::Environment;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resource naming conventions
///
/// Every durable resource name is a deterministic function of the org
/// prefix and the team slug, so idempotent re-runs land on the same names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConventions {
    /// Prefix stamped on every resource name, usually the org slug
    pub prefix: String,
}

impl NamingConventions {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Object-storage bucket holding a team's IaC state.
    pub fn state_bucket(&self, team: &TeamId, environment: Environment) -> String {
        format!("{}-{}-{}-tfstate", self.prefix, team, environment)
    }

    /// Key-value table used for state locking.
    pub fn lock_table(&self, team: &TeamId, environment: Environment) -> String {
        format!("{}-{}-{}-tflock", self.prefix, team, environment)
    }

    /// Isolation role assumed by the team's automation server.
    pub fn role_name(&self, team: &TeamId) -> String {
        format!("{}-{}-cell-role", self.prefix, team)
    }

    /// Permission boundary constraining the isolation role to resources
    /// tagged with the team identity.
    pub fn permission_boundary(&self, team: &TeamId) -> String {
        format!("{}-{}-cell-boundary", self.prefix, team)
    }

    /// Container service running the automation server.
    pub fn service_name(&self, team: &TeamId, environment: Environment) -> String {
        format!("{}-{}-{}-automation", self.prefix, team, environment)
    }

    /// Secrets-store reference for the team's credential bundle.
    pub fn secrets_ref(&self, team: &TeamId) -> String {
        format!("{}/{}/credential-bundle", self.prefix, team)
    }

    /// Timestamped backup location for pre-destroy state snapshots.
    pub fn backup_location(&self, team: &TeamId, timestamp: &str) -> String {
        format!("{}-backups/{}/{}", self.prefix, team, timestamp)
    }
}

/// Bounded health polling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthPollConfig {
    /// Number of polling attempts before giving up with a warning
    pub max_attempts: u32,

    /// Fixed interval between attempts
    #[serde(with = "duration_secs")]
    pub interval: Duration,

    /// Timeout applied to each individual probe call
    #[serde(with = "duration_secs")]
    pub probe_timeout: Duration,
}

impl Default for HealthPollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(10),
        }
    }
}

/// A protected-resource pattern, evaluated during impact analysis
///
/// Matches on resource kind plus a name or tag substring. Any match blocks
/// a destructive operation unless forced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectedPattern {
    /// Resource kind this pattern applies to, or `None` for any kind
    pub kind: Option<String>,

    /// Substring matched against the resource name
    pub name_contains: Option<String>,

    /// Tag key that marks the resource protected
    pub tag_key: Option<String>,
}

/// Immutable organization-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgConfig {
    /// Organization slug
    pub org: String,

    /// Cloud region all cells are provisioned into
    pub region: String,

    /// Resource naming conventions
    pub naming: NamingConventions,

    /// Automation-server container image
    pub automation_image: String,

    /// Health polling parameters
    #[serde(default)]
    pub health_poll: HealthPollConfig,

    /// Bound on concurrent independent-team onboarding
    #[serde(default = "default_fanout")]
    pub onboard_fanout: usize,

    /// Timeout applied to every cloud-provider call
    #[serde(with = "duration_secs", default = "default_provider_timeout")]
    pub provider_timeout: Duration,

    /// Protected-resource patterns consulted by the safety guard
    #[serde(default)]
    pub protected_patterns: Vec<ProtectedPattern>,

    /// Webhook receiving structured operation summaries, if any
    #[serde(default)]
    pub notification_webhook: Option<String>,
}

impl OrgConfig {
    /// Config with the default protected patterns: backup stores, lock
    /// tables, audit trails, and key-management resources.
    pub fn new(org: impl Into<String>, region: impl Into<String>) -> Self {
        let org = org.into();
        Self {
            naming: NamingConventions::new(org.clone()),
            org,
            region: region.into(),
            automation_image: "automation-server:stable".into(),
            health_poll: HealthPollConfig::default(),
            onboard_fanout: default_fanout(),
            provider_timeout: default_provider_timeout(),
            protected_patterns: Self::default_protected_patterns(),
            notification_webhook: None,
        }
    }

    pub fn default_protected_patterns() -> Vec<ProtectedPattern> {
        let name_pattern = |needle: &str| ProtectedPattern {
            kind: None,
            name_contains: Some(needle.to_string()),
            tag_key: None,
        };
        vec![
            name_pattern("backup"),
            name_pattern("tflock"),
            name_pattern("audit"),
            name_pattern("kms"),
            ProtectedPattern {
                kind: None,
                name_contains: None,
                tag_key: Some("cellkit:protected".to_string()),
            },
        ]
    }
}

fn default_fanout() -> usize {
    4
}

fn default_provider_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Serde helper for Duration as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_is_deterministic() {
        let naming = NamingConventions::new("acme");
        let team = TeamId::new("payments").unwrap();

        assert_eq!(
            naming.state_bucket(&team, Environment::Prod),
            "acme-payments-prod-tfstate"
        );
        assert_eq!(
            naming.lock_table(&team, Environment::Dev),
            "acme-payments-dev-tflock"
        );
        assert_eq!(naming.role_name(&team), "acme-payments-cell-role");
    }

    #[test]
    fn test_default_patterns_cover_lock_tables() {
        let patterns = OrgConfig::default_protected_patterns();
        assert!(patterns
            .iter()
            .any(|p| p.name_contains.as_deref() == Some("tflock")));
    }
}
