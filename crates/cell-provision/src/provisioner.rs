//! Team Provisioner - drives onboarding to completion
//!
//! State machine per team:
//! `requested → role_created → state_backend_created → registered`.
//! Each step checks for existing resources and skips them, so re-running
//! onboarding for a failed team resumes instead of duplicating. On step
//! failure the workflow aborts and reports which step failed; recovery is
//! forward-only via re-invocation.

use crate::error::{ProvisionError, Result};
use cell_provider::{CloudProvider, ProviderError};
use cell_registry::{network_range_for, IdAllocator, TeamRegistry};
use cell_types::{
    CellEvent, CellEventEnvelope, Environment, OrgConfig, StateBackend, Team, TeamId, TeamStatus,
    Tier,
};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

/// Provisioning steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStep {
    IsolationRole,
    StateBackend,
    Register,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionStep::IsolationRole => f.write_str("isolation_role"),
            ProvisionStep::StateBackend => f.write_str("state_backend"),
            ProvisionStep::Register => f.write_str("register"),
        }
    }
}

/// A request to onboard a new team
#[derive(Debug, Clone)]
pub struct OnboardRequest {
    pub id: TeamId,
    pub cost_center: String,
    pub environment: Environment,
    pub leads: BTreeSet<String>,
    pub tier: Tier,
    pub budget_monthly: Option<f64>,
}

impl OnboardRequest {
    pub fn new(id: TeamId, cost_center: impl Into<String>, environment: Environment) -> Self {
        Self {
            id,
            cost_center: cost_center.into(),
            environment,
            leads: BTreeSet::new(),
            tier: Tier::default(),
            budget_monthly: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.cost_center.trim().is_empty() {
            return Err(ProvisionError::Validation(
                "cost_center must not be empty".into(),
            ));
        }
        if self.leads.is_empty() {
            return Err(ProvisionError::Validation(
                "at least one team lead is required".into(),
            ));
        }
        Ok(())
    }
}

/// Result of a provisioning run
#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    pub team: Team,
    /// Whether this run resumed a previously failed onboarding
    pub resumed: bool,
    pub state_backend: StateBackend,
}

/// Orchestrates creation of a team's durable resources
pub struct TeamProvisioner {
    config: OrgConfig,
    registry: Arc<dyn TeamRegistry>,
    allocator: IdAllocator,
    provider: Arc<dyn CloudProvider>,
    event_tx: broadcast::Sender<CellEventEnvelope>,
}

impl TeamProvisioner {
    pub fn new(
        config: OrgConfig,
        registry: Arc<dyn TeamRegistry>,
        allocator: IdAllocator,
        provider: Arc<dyn CloudProvider>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            config,
            registry,
            allocator,
            provider,
            event_tx,
        }
    }

    /// Subscribe to provisioning events.
    pub fn subscribe(&self) -> broadcast::Receiver<CellEventEnvelope> {
        self.event_tx.subscribe()
    }

    /// Onboard a team, or resume a previously failed onboarding.
    ///
    /// A team that already reached active service is reported as
    /// `AlreadyExists`; nothing is created twice.
    #[instrument(skip(self, request), fields(team = %request.id))]
    pub async fn onboard(&self, request: OnboardRequest) -> Result<ProvisionOutcome> {
        request.validate()?;

        // 1. Find or create the registry record. A record still in
        //    `requested` means a failed run we resume with the identity
        //    it already claimed; anything further along is a duplicate.
        let (team, resumed) = match self.registry.get(&request.id).await? {
            Some(existing) if existing.status == TeamStatus::Requested => {
                info!(team = %existing.id, numeric_id = existing.numeric_id, "Resuming incomplete onboarding");
                (existing, true)
            }
            Some(existing) => return Err(ProvisionError::AlreadyExists(existing.id)),
            None => (self.register_new(&request).await?, false),
        };

        // 2. Isolation role, constrained by a team-scoped permission
        //    boundary.
        let role = self.config.naming.role_name(&team.id);
        let boundary = self.config.naming.permission_boundary(&team.id);
        if !self
            .step_call(&team.id, ProvisionStep::IsolationRole, &role, self.provider.role_exists(&role))
            .await?
        {
            self.step_call(
                &team.id,
                ProvisionStep::IsolationRole,
                &role,
                self.provider.create_role(&team.id, &role, &boundary),
            )
            .await?;
        }
        self.emit_step(&team.id, ProvisionStep::IsolationRole);

        // 3. State backend: encrypted bucket restricted to the role, plus
        //    the lock table.
        let bucket = self.config.naming.state_bucket(&team.id, team.environment);
        let lock_table = self.config.naming.lock_table(&team.id, team.environment);
        if !self
            .step_call(&team.id, ProvisionStep::StateBackend, &bucket, self.provider.bucket_exists(&bucket))
            .await?
        {
            self.step_call(
                &team.id,
                ProvisionStep::StateBackend,
                &bucket,
                self.provider.create_state_bucket(&team.id, &bucket, &role),
            )
            .await?;
        }
        if !self
            .step_call(
                &team.id,
                ProvisionStep::StateBackend,
                &lock_table,
                self.provider.lock_table_exists(&lock_table),
            )
            .await?
        {
            self.step_call(
                &team.id,
                ProvisionStep::StateBackend,
                &lock_table,
                self.provider.create_lock_table(&team.id, &lock_table),
            )
            .await?;
        }
        self.emit_step(&team.id, ProvisionStep::StateBackend);

        // 4. Publish provisioner outputs for the orchestrator's
        //    remote-state read.
        let state_doc = serde_json::json!({
            "numeric_id": team.numeric_id,
            "network_range": team.network_range,
            "role": role,
            "state_bucket": bucket,
            "lock_table": lock_table,
            "region": self.config.region,
        });
        self.step_call(
            &team.id,
            ProvisionStep::Register,
            &bucket,
            self.provider.write_state_doc(&team.id, team.environment, state_doc),
        )
        .await?;

        let team = self
            .registry
            .update(&team.id, Box::new(|t| t.status = TeamStatus::Provisioning))
            .await?;
        self.emit_step(&team.id, ProvisionStep::Register);

        self.emit(CellEventEnvelope::info(CellEvent::TeamOnboarded {
            team: team.id.clone(),
            numeric_id: team.numeric_id,
            network_range: team.network_range.clone(),
        }));
        info!(
            team = %team.id,
            numeric_id = team.numeric_id,
            network_range = %team.network_range,
            resumed,
            "Team provisioned, pending deployment"
        );

        Ok(ProvisionOutcome {
            state_backend: StateBackend { bucket, lock_table },
            team,
            resumed,
        })
    }

    /// The per-(team, environment) state backend names.
    pub fn state_backend_for(&self, team: &TeamId, environment: Environment) -> StateBackend {
        StateBackend {
            bucket: self.config.naming.state_bucket(team, environment),
            lock_table: self.config.naming.lock_table(team, environment),
        }
    }

    // --- Internal helpers ---

    /// Claim an identity and create the registry record.
    async fn register_new(&self, request: &OnboardRequest) -> Result<Team> {
        let numeric_id = self.allocator.allocate(&request.id).await?;

        let now = chrono::Utc::now();
        let team = Team {
            id: request.id.clone(),
            numeric_id,
            status: TeamStatus::Requested,
            org: self.config.org.clone(),
            cost_center: request.cost_center.clone(),
            budget_monthly: request.budget_monthly,
            environment: request.environment,
            region: self.config.region.clone(),
            leads: request.leads.clone(),
            network_range: network_range_for(numeric_id),
            tier: request.tier,
            created_at: now,
            last_modified: now,
        };

        if let Err(err) = self.registry.put(team.clone()).await {
            // Lost a put race for the slug: give the slot back before
            // surfacing the conflict.
            self.allocator.release(numeric_id).await?;
            return Err(err.into());
        }
        Ok(team)
    }

    /// Run one provider call under the configured timeout, mapping
    /// failures to `StepFailed` with the step and resource that broke.
    async fn step_call<T>(
        &self,
        team: &TeamId,
        step: ProvisionStep,
        resource: &str,
        call: impl Future<Output = cell_provider::Result<T>>,
    ) -> Result<T> {
        let outcome = tokio::time::timeout(self.config.provider_timeout, call)
            .await
            .map_err(|_| ProviderError::Timeout {
                operation: step.to_string(),
            })
            .and_then(|r| r);

        outcome.map_err(|source| {
            warn!(step = %step, resource, error = %source, "Provisioning step failed");
            self.emit(CellEventEnvelope::error(CellEvent::ProvisionStepFailed {
                team: team.clone(),
                step: step.to_string(),
                resource: resource.to_string(),
            }));
            ProvisionError::StepFailed {
                step,
                resource: resource.to_string(),
                source,
            }
        })
    }

    fn emit_step(&self, team: &TeamId, step: ProvisionStep) {
        self.emit(CellEventEnvelope::info(CellEvent::ProvisionStepCompleted {
            team: team.clone(),
            step: step.to_string(),
        }));
    }

    fn emit(&self, envelope: CellEventEnvelope) {
        let _ = self.event_tx.send(envelope);
    }
}
