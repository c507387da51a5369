//! Unified event stream
//!
//! Every lifecycle operation emits structured events consumed by the
//! notification sink and by tests. Events carry identifiers and summaries
//! only, never secret values.

use crate::ids::TeamId;
use crate::tier::Tier;
use serde::{Deserialize, Serialize};

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

/// Structured lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CellEvent {
    TeamOnboarded {
        team: TeamId,
        numeric_id: u8,
        network_range: String,
    },
    ProvisionStepCompleted {
        team: TeamId,
        step: String,
    },
    ProvisionStepFailed {
        team: TeamId,
        step: String,
        resource: String,
    },
    DeploymentApplied {
        team: TeamId,
        tier: Tier,
        endpoint_url: String,
    },
    DeploymentHealthUnknown {
        team: TeamId,
        attempts: u32,
    },
    TeamScaled {
        team: TeamId,
        from_tier: Tier,
        to_tier: Tier,
    },
    SecretsRotated {
        team: TeamId,
        keys: Vec<String>,
        bundle_version: u64,
    },
    BudgetConfigured {
        team: TeamId,
        monthly_limit: f64,
    },
    GuardVeto {
        team: Option<TeamId>,
        resource: String,
        pattern: String,
    },
    BackupCreated {
        team: Option<TeamId>,
        location: String,
    },
    TeamDecommissioned {
        team: TeamId,
        freed_numeric_id: u8,
    },
}

/// Event with metadata envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellEventEnvelope {
    /// Unique event id
    pub id: uuid::Uuid,

    /// Severity classification
    pub severity: EventSeverity,

    /// The event itself
    pub event: CellEvent,

    /// Emission timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl CellEventEnvelope {
    pub fn new(event: CellEvent, severity: EventSeverity) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            severity,
            event,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn info(event: CellEvent) -> Self {
        Self::new(event, EventSeverity::Info)
    }

    pub fn warning(event: CellEvent) -> Self {
        Self::new(event, EventSeverity::Warning)
    }

    pub fn error(event: CellEvent) -> Self {
        Self::new(event, EventSeverity::Error)
    }
}
