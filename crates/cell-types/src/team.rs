//! Team record and lifecycle status
//!
//! One `Team` row per tenant. The load-bearing invariant of the whole
//! system: for any two non-decommissioned teams the `numeric_id` differs,
//! and because `network_range` is an injective function of `numeric_id`,
//! network ranges are pairwise disjoint.

use crate::ids::TeamId;
use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Deployment environment for a team's resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Prod,
    Dev,
}

impl Environment {
    /// Production environments require escalated confirmation for
    /// destructive operations.
    pub fn is_critical(&self) -> bool {
        matches!(self, Environment::Prod)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Prod => f.write_str("prod"),
            Environment::Dev => f.write_str("dev"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(Environment::Prod),
            "dev" | "development" => Ok(Environment::Dev),
            other => Err(format!("unknown environment {:?}, expected prod|dev", other)),
        }
    }
}

/// Team lifecycle status
///
/// Monotonic except for the `Active` ⇄ `Scaling`/`Rotating` transient pair.
/// `Decommissioned` is terminal; a decommissioned team's `numeric_id`
/// becomes reclaimable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamStatus {
    Requested,
    Provisioning,
    Active,
    Scaling,
    Rotating,
    Decommissioning,
    Decommissioned,
}

impl TeamStatus {
    pub fn is_decommissioned(&self) -> bool {
        matches!(self, TeamStatus::Decommissioned)
    }

    /// Whether this team still occupies its numeric-id slot.
    pub fn occupies_slot(&self) -> bool {
        !self.is_decommissioned()
    }
}

impl fmt::Display for TeamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TeamStatus::Requested => "requested",
            TeamStatus::Provisioning => "provisioning",
            TeamStatus::Active => "active",
            TeamStatus::Scaling => "scaling",
            TeamStatus::Rotating => "rotating",
            TeamStatus::Decommissioning => "decommissioning",
            TeamStatus::Decommissioned => "decommissioned",
        };
        f.write_str(s)
    }
}

/// Per-(team, environment) durable state backend
///
/// Created once by the provisioner, never reused across teams, deleted
/// only on decommission (optionally retained as a backup artifact).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateBackend {
    /// Object-storage bucket holding the IaC state
    pub bucket: String,
    /// Key-value table used for state locking
    pub lock_table: String,
}

/// One row per tenant; the single source of truth for identity and status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Immutable, unique, caller-chosen slug
    pub id: TeamId,

    /// Unique small-integer identity in [1, 254] across all
    /// non-decommissioned teams
    pub numeric_id: u8,

    /// Lifecycle status
    pub status: TeamStatus,

    /// Owning organization
    pub org: String,

    /// Cost center for budget tagging
    pub cost_center: String,

    /// Optional monthly budget limit in USD
    pub budget_monthly: Option<f64>,

    /// Deployment environment
    pub environment: Environment,

    /// Cloud region
    pub region: String,

    /// Team lead identities
    pub leads: BTreeSet<String>,

    /// Derived network range, `10.{numeric_id}.0.0/16`
    pub network_range: String,

    /// Size class driving compute sizing
    pub tier: Tier,

    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,

    /// Last modification timestamp
    pub last_modified: chrono::DateTime<chrono::Utc>,
}

impl Team {
    /// Transition to a new status, touching `last_modified`.
    pub fn set_status(&mut self, status: TeamStatus) {
        self.status = status;
        self.touch();
    }

    /// Update the modification timestamp.
    pub fn touch(&mut self) {
        self.last_modified = chrono::Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_slot_occupancy() {
        assert!(TeamStatus::Active.occupies_slot());
        assert!(TeamStatus::Requested.occupies_slot());
        assert!(TeamStatus::Decommissioning.occupies_slot());
        assert!(!TeamStatus::Decommissioned.occupies_slot());
    }

    #[test]
    fn test_environment_criticality() {
        assert!(Environment::Prod.is_critical());
        assert!(!Environment::Dev.is_critical());
    }
}
