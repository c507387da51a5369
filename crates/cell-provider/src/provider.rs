//! Cloud provider trait definition

use crate::error::Result;
use async_trait::async_trait;
use cell_types::{DeploymentDescriptor, Environment, TeamId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of a cloud resource, used for impact grouping and protection
/// matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Role,
    Bucket,
    LockTable,
    Service,
    LoadBalancer,
    SecretsBundle,
    BudgetAlert,
    Other,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Role => "role",
            ResourceKind::Bucket => "bucket",
            ResourceKind::LockTable => "lock_table",
            ResourceKind::Service => "service",
            ResourceKind::LoadBalancer => "load_balancer",
            ResourceKind::SecretsBundle => "secrets_bundle",
            ResourceKind::BudgetAlert => "budget_alert",
            ResourceKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// A concrete cloud resource, addressable for deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
    pub tags: BTreeMap<String, String>,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Running/desired counts of a container service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: u32,
    pub desired: u32,
}

/// Health of one load-balancer target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetHealth {
    pub target: String,
    pub healthy: bool,
}

/// Budget alert configuration tagged to a cost center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetAlerts {
    pub cost_center: String,
    pub monthly_limit: f64,
    /// Percentages of the limit at which alerts fire, e.g. [50, 80, 100]
    pub alert_thresholds: Vec<u8>,
}

/// The cloud control plane cellkit provisions against
///
/// Creation calls are idempotent at the caller level: the provisioner
/// checks `*_exists` and skips, so providers may treat duplicate creates
/// as errors.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    // ---- Identity / isolation role ----

    /// Create the team's isolation role, constrained by a permission
    /// boundary scoped to resources tagged with the team identity.
    async fn create_role(&self, team: &TeamId, role: &str, boundary: &str) -> Result<()>;

    async fn role_exists(&self, role: &str) -> Result<bool>;

    async fn delete_role(&self, role: &str) -> Result<()>;

    // ---- State backend ----

    /// Create the encrypted state bucket, access-restricted to the
    /// team's role.
    async fn create_state_bucket(&self, team: &TeamId, bucket: &str, role: &str) -> Result<()>;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    async fn create_lock_table(&self, team: &TeamId, table: &str) -> Result<()>;

    async fn lock_table_exists(&self, table: &str) -> Result<bool>;

    async fn delete_lock_table(&self, table: &str) -> Result<()>;

    // ---- Remote-state documents ----

    /// Write a provisioner-output document keyed by (team, environment).
    async fn write_state_doc(
        &self,
        team: &TeamId,
        environment: Environment,
        doc: serde_json::Value,
    ) -> Result<()>;

    /// Read the provisioner-output document for (team, environment).
    async fn read_state_doc(
        &self,
        team: &TeamId,
        environment: Environment,
    ) -> Result<Option<serde_json::Value>>;

    // ---- Container service / load balancer ----

    /// Create-or-replace the automation-server service for a descriptor.
    /// Returns the endpoint URL behind the load balancer.
    async fn apply_service(&self, service: &str, descriptor: &DeploymentDescriptor)
        -> Result<String>;

    async fn describe_service(&self, service: &str) -> Result<ServiceStatus>;

    async fn delete_service(&self, service: &str) -> Result<()>;

    /// Health of the load-balancer targets backing a service.
    async fn target_health(&self, service: &str) -> Result<Vec<TargetHealth>>;

    /// Probe the service health endpoint once.
    async fn probe_endpoint(&self, endpoint_url: &str) -> Result<bool>;

    /// Tail the most recent log lines of a service.
    async fn tail_logs(&self, service: &str, lines: usize) -> Result<Vec<String>>;

    // ---- Budgets ----

    async fn configure_budget_alerts(&self, team: &TeamId, alerts: &BudgetAlerts) -> Result<()>;

    // ---- Generic resource surface (impact analysis / teardown) ----

    /// Materialize a named IaC stack for an environment, returning the
    /// resources it now consists of. Re-applying converges on the same
    /// set.
    async fn apply_stack(&self, stack: &str, environment: Environment)
        -> Result<Vec<ResourceRef>>;

    /// All resources tagged with the team identity.
    async fn list_team_resources(&self, team: &TeamId) -> Result<Vec<ResourceRef>>;

    /// All resources belonging to a named stack.
    async fn list_stack_resources(&self, stack: &str) -> Result<Vec<ResourceRef>>;

    /// Delete one resource. Partial failures surface to the guard, which
    /// reports them rather than retrying.
    async fn delete_resource(&self, resource: &ResourceRef) -> Result<()>;
}
