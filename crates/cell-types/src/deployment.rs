//! Deployment descriptor and record
//!
//! The descriptor is what the container-orchestration collaborator
//! consumes; the record is what cellkit tracks per (team, environment).
//! Deployments are re-created whole (create-or-replace), never diffed.

use crate::ids::TeamId;
use crate::team::Environment;
use crate::tier::Tier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Desired state handed to the container-orchestration collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentDescriptor {
    /// Owning team
    pub team: TeamId,

    /// Target environment
    pub environment: Environment,

    /// Size class the sizing was derived from
    pub tier: Tier,

    /// CPU units
    pub cpu: u32,

    /// Memory in MiB
    pub memory: u32,

    /// Desired replica count
    pub replicas: u32,

    /// Container image reference
    pub image: String,

    /// Plain environment variables (never secret values)
    pub env_vars: BTreeMap<String, String>,

    /// Reference to the team's credential bundle, resolved at runtime by
    /// the container service
    pub secrets_ref: String,
}

impl DeploymentDescriptor {
    /// Derive a descriptor from the tier sizing table.
    pub fn for_tier(
        team: TeamId,
        environment: Environment,
        tier: Tier,
        image: impl Into<String>,
        secrets_ref: impl Into<String>,
    ) -> Self {
        let sizing = tier.sizing();
        Self {
            team,
            environment,
            tier,
            cpu: sizing.cpu,
            memory: sizing.memory,
            replicas: sizing.replicas,
            image: image.into(),
            env_vars: BTreeMap::new(),
            secrets_ref: secrets_ref.into(),
        }
    }
}

/// Health of a deployed automation-server instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Not yet observed healthy; the deployment may still converge
    Unknown,
    Healthy,
    Unhealthy,
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Unknown => f.write_str("unknown"),
            HealthState::Healthy => f.write_str("healthy"),
            HealthState::Unhealthy => f.write_str("unhealthy"),
        }
    }
}

/// Tracked deployment state, 1:1 with a team per environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Applied descriptor
    pub descriptor: DeploymentDescriptor,

    /// Public endpoint URL behind the load balancer
    pub endpoint_url: String,

    /// Last observed health
    pub health: HealthState,

    /// When the descriptor was last applied
    pub applied_at: chrono::DateTime<chrono::Utc>,
}
