//! Lifecycle Operator
//!
//! Composition root for every team operation. Status transitions live
//! here and nowhere else: the provisioner leaves a team at
//! `Provisioning`, and this operator moves it through `Active`, the
//! transient `Scaling`/`Rotating` states, and finally `Decommissioned`.

use crate::error::{LifecycleError, Result};
use cell_guard::{Confirmer, DestroyPlan, DestructionReport, ImpactReport, SafetyGuard};
use cell_orchestrator::AutomationOrchestrator;
use cell_provider::{
    BudgetAlerts, CloudProvider, ProviderError, ResourceKind, ResourceRef, ServiceStatus,
    TargetHealth,
};
use cell_types::Environment;
use cell_provision::{OnboardRequest, ProvisionOutcome, TeamProvisioner};
use cell_registry::{IdAllocator, SlotClaims, TeamRegistry};
use cell_secrets::{BundleStore, CredentialBundleManager, SecretsError};
use cell_types::{
    bundle::WEBHOOK_SECRET_KEY, CellEvent, CellEventEnvelope, DeploymentRecord, OrgConfig, Team,
    TeamId, TeamStatus, Tier,
};
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

/// Outcome of a bounded-concurrency onboarding fan-out
#[derive(Debug, Default)]
pub struct OnboardSummary {
    pub succeeded: Vec<ProvisionOutcome>,
    /// Failures by team slug with the rendered error
    pub failed: Vec<(TeamId, String)>,
}

/// Outcome of a credential rotation
#[derive(Debug)]
pub struct RotationReport {
    pub bundle_version: u64,
    /// Names of the keys that changed; values are never carried
    pub keys: Vec<String>,
    pub deployment: DeploymentRecord,
}

/// Read-only health snapshot of one team
#[derive(Debug, serde::Serialize)]
pub struct DiagnosisReport {
    pub team: TeamId,
    pub status: TeamStatus,
    pub tier: Tier,
    pub numeric_id: u8,
    pub network_range: String,
    pub service: Option<ServiceStatus>,
    pub targets: Vec<TargetHealth>,
    pub log_tail: Vec<String>,
    pub bundle_version: Option<u64>,
    /// Human-readable observations worth an operator's attention
    pub findings: Vec<String>,
}

/// Options for team decommission
#[derive(Debug, Clone, Default)]
pub struct DecommissionOptions {
    /// Snapshot state before destruction and retain the state backend
    pub backup: bool,

    /// Transfer retained state to another team before any deletion
    pub transfer_to: Option<TeamId>,

    /// Override protected-pattern vetoes
    pub force: bool,
}

/// What a completed decommission did
#[derive(Debug, serde::Serialize)]
pub struct DecommissionReport {
    pub team: TeamId,
    pub freed_numeric_id: u8,
    pub transferred_to: Option<TeamId>,
    pub destruction: DestructionReport,
}

/// Facade over the full provisioning and lifecycle machinery
pub struct LifecycleOperator {
    config: OrgConfig,
    registry: Arc<dyn TeamRegistry>,
    claims: Arc<dyn SlotClaims>,
    provider: Arc<dyn CloudProvider>,
    secrets: CredentialBundleManager,
    provisioner: TeamProvisioner,
    orchestrator: AutomationOrchestrator,
    guard: SafetyGuard,
    event_tx: broadcast::Sender<CellEventEnvelope>,
}

impl LifecycleOperator {
    /// Wire up the operator. Must be called within a Tokio runtime; the
    /// component event streams are forwarded by background tasks.
    pub fn new(
        config: OrgConfig,
        registry: Arc<dyn TeamRegistry>,
        claims: Arc<dyn SlotClaims>,
        provider: Arc<dyn CloudProvider>,
        bundles: Arc<dyn BundleStore>,
        confirmer: Arc<dyn Confirmer>,
    ) -> Self {
        let allocator = IdAllocator::new(registry.clone(), claims.clone());
        let provisioner = TeamProvisioner::new(
            config.clone(),
            registry.clone(),
            allocator,
            provider.clone(),
        );
        let orchestrator = AutomationOrchestrator::new(config.clone(), provider.clone());
        let guard = SafetyGuard::new(&config, provider.clone(), confirmer);
        let secrets = CredentialBundleManager::new(bundles);

        let (event_tx, _) = broadcast::channel(1024);
        forward_events(provisioner.subscribe(), event_tx.clone());
        forward_events(orchestrator.subscribe(), event_tx.clone());
        forward_events(guard.subscribe(), event_tx.clone());

        Self {
            config,
            registry,
            claims,
            provider,
            secrets,
            provisioner,
            orchestrator,
            guard,
            event_tx,
        }
    }

    /// Subscribe to the unified event stream of all components.
    pub fn subscribe(&self) -> broadcast::Receiver<CellEventEnvelope> {
        self.event_tx.subscribe()
    }

    /// Fetch a team record.
    pub async fn get_team(&self, id: &TeamId) -> Result<Team> {
        self.require(id).await
    }

    /// All teams still occupying a slot.
    pub async fn list_teams(&self) -> Result<Vec<Team>> {
        Ok(self
            .registry
            .scan(&cell_registry::TeamFilter::occupying_slots())
            .await?)
    }

    /// Onboard one team: provision durable resources, then seed the
    /// credential bundle.
    #[instrument(skip(self, request), fields(team = %request.id))]
    pub async fn onboard(&self, request: OnboardRequest) -> Result<ProvisionOutcome> {
        let outcome = self.provisioner.onboard(request).await?;

        match self.secrets.get(&outcome.team.id).await {
            Ok(_) => {}
            Err(SecretsError::BundleNotFound(_)) => {
                self.secrets
                    .initialize(&outcome.team.id, BTreeMap::new())
                    .await?;
            }
            Err(other) => return Err(other.into()),
        }
        Ok(outcome)
    }

    /// Onboard independent teams concurrently, bounded by the configured
    /// fan-out. Failures are collected, never aborting the batch.
    pub async fn onboard_many(&self, requests: Vec<OnboardRequest>) -> OnboardSummary {
        let fanout = self.config.onboard_fanout.max(1);
        let results: Vec<(TeamId, Result<ProvisionOutcome>)> = stream::iter(requests)
            .map(|request| {
                let id = request.id.clone();
                async move { (id, self.onboard(request).await) }
            })
            .buffer_unordered(fanout)
            .collect()
            .await;

        let mut summary = OnboardSummary::default();
        for (id, result) in results {
            match result {
                Ok(outcome) => summary.succeeded.push(outcome),
                Err(err) => {
                    warn!(team = %id, error = %err, "Onboarding failed");
                    summary.failed.push((id, err.to_string()));
                }
            }
        }
        summary
    }

    /// Deploy (or redeploy) the team's automation server and mark the
    /// team active.
    #[instrument(skip(self), fields(team = %id))]
    pub async fn deploy(&self, id: &TeamId) -> Result<DeploymentRecord> {
        let team = self.require(id).await?;
        if !deployable(team.status) {
            return Err(LifecycleError::InvalidStatus {
                team: team.id,
                status: team.status,
            });
        }

        let record = self.orchestrator.deploy(&team).await?;
        self.registry
            .update(id, Box::new(|t| t.status = TeamStatus::Active))
            .await?;
        Ok(record)
    }

    /// Move the team to a new size class and re-apply the deployment.
    #[instrument(skip(self), fields(team = %id, tier = %tier))]
    pub async fn scale(&self, id: &TeamId, tier: Tier) -> Result<DeploymentRecord> {
        let team = self.require_active(id).await?;
        let from_tier = team.tier;

        let team = self
            .registry
            .update(
                id,
                Box::new(move |t| {
                    t.status = TeamStatus::Scaling;
                    t.tier = tier;
                }),
            )
            .await?;
        // A failed deploy rolls the record back to its pre-scale shape so
        // the team never sticks in `Scaling`.
        let record = match self.orchestrator.deploy(&team).await {
            Ok(record) => record,
            Err(err) => {
                self.registry
                    .update(
                        id,
                        Box::new(move |t| {
                            t.status = TeamStatus::Active;
                            t.tier = from_tier;
                        }),
                    )
                    .await?;
                return Err(err.into());
            }
        };
        self.registry
            .update(id, Box::new(|t| t.status = TeamStatus::Active))
            .await?;

        self.emit(CellEventEnvelope::info(CellEvent::TeamScaled {
            team: team.id.clone(),
            from_tier,
            to_tier: tier,
        }));
        info!(team = %team.id, from = %from_tier, to = %tier, "Team scaled");
        Ok(record)
    }

    /// Rotate credentials: merge the given keys (or regenerate all
    /// self-owned secrets), then force a redeploy so the running service
    /// picks up the new bundle version.
    #[instrument(skip(self, updates), fields(team = %id, rotate_all))]
    pub async fn rotate(
        &self,
        id: &TeamId,
        updates: BTreeMap<String, String>,
        rotate_all: bool,
    ) -> Result<RotationReport> {
        let _ = self.require_active(id).await?;

        let team = self
            .registry
            .update(id, Box::new(|t| t.status = TeamStatus::Rotating))
            .await?;

        let mut keys: Vec<String> = updates.keys().cloned().collect();
        let bundle = if rotate_all {
            keys.push(WEBHOOK_SECRET_KEY.to_string());
            self.secrets.rotate_all(id, updates).await?
        } else {
            self.secrets.merge(id, updates).await?
        };

        // The bundle write is already committed; on a failed deploy the
        // team goes back to `Active` so a retry can redeploy at the new
        // bundle version.
        let deployment = match self.orchestrator.deploy(&team).await {
            Ok(deployment) => deployment,
            Err(err) => {
                self.registry
                    .update(id, Box::new(|t| t.status = TeamStatus::Active))
                    .await?;
                return Err(err.into());
            }
        };
        self.registry
            .update(id, Box::new(|t| t.status = TeamStatus::Active))
            .await?;

        self.emit(CellEventEnvelope::info(CellEvent::SecretsRotated {
            team: team.id.clone(),
            keys: keys.clone(),
            bundle_version: bundle.version,
        }));
        Ok(RotationReport {
            bundle_version: bundle.version,
            keys,
            deployment,
        })
    }

    /// Configure budget alerts for the team's cost center. Independent of
    /// deployment state.
    #[instrument(skip(self), fields(team = %id))]
    pub async fn set_budget(
        &self,
        id: &TeamId,
        monthly_limit: f64,
        alert_thresholds: Vec<u8>,
    ) -> Result<Team> {
        if monthly_limit <= 0.0 {
            return Err(LifecycleError::Validation(
                "monthly limit must be positive".into(),
            ));
        }
        let team = self.require(id).await?;

        let alerts = BudgetAlerts {
            cost_center: team.cost_center.clone(),
            monthly_limit,
            alert_thresholds,
        };
        self.provider_call(
            "configure_budget_alerts",
            self.provider.configure_budget_alerts(id, &alerts),
        )
        .await?;
        let team = self
            .registry
            .update(
                id,
                Box::new(move |t| t.budget_monthly = Some(monthly_limit)),
            )
            .await?;

        self.emit(CellEventEnvelope::info(CellEvent::BudgetConfigured {
            team: team.id.clone(),
            monthly_limit,
        }));
        Ok(team)
    }

    /// Read-only probe fan-out. Never mutates the registry; a diagnosis
    /// leaves `last_modified` exactly as it was.
    #[instrument(skip(self), fields(team = %id))]
    pub async fn diagnose(&self, id: &TeamId) -> Result<DiagnosisReport> {
        let team = self.require(id).await?;
        let service_name = self
            .config
            .naming
            .service_name(&team.id, team.environment);
        let mut findings = Vec::new();

        let service = match self
            .provider_call(
                "describe_service",
                self.provider.describe_service(&service_name),
            )
            .await
        {
            Ok(status) => {
                if status.running < status.desired {
                    findings.push(format!(
                        "{} of {} replicas running",
                        status.running, status.desired
                    ));
                }
                Some(status)
            }
            Err(ProviderError::Timeout { .. }) => {
                findings.push("automation service probe timed out".to_string());
                None
            }
            Err(_) => {
                findings.push("automation service not deployed".to_string());
                None
            }
        };

        let targets = self
            .provider_call("target_health", self.provider.target_health(&service_name))
            .await
            .unwrap_or_default();
        let unhealthy = targets.iter().filter(|t| !t.healthy).count();
        if unhealthy > 0 {
            findings.push(format!("{unhealthy} unhealthy load-balancer targets"));
        }

        let log_tail = self
            .provider_call("tail_logs", self.provider.tail_logs(&service_name, 20))
            .await
            .unwrap_or_default();

        let bundle_version = match self.secrets.get(id).await {
            Ok(bundle) => Some(bundle.version),
            Err(_) => {
                findings.push("credential bundle missing".to_string());
                None
            }
        };

        Ok(DiagnosisReport {
            team: team.id,
            status: team.status,
            tier: team.tier,
            numeric_id: team.numeric_id,
            network_range: team.network_range,
            service,
            targets,
            log_tail,
            bundle_version,
            findings,
        })
    }

    /// Decommission a team through the safety guard, then release its
    /// identity.
    ///
    /// With `backup` the state backend is retained (and snapshotted);
    /// without it the state bucket and lock table join the deletion set,
    /// which trips the default lock-table protection unless forced.
    /// `transfer_to` runs before any deletion: if the transfer fails the
    /// whole operation aborts with every resource intact.
    #[instrument(skip(self, opts), fields(team = %id))]
    pub async fn decommission(
        &self,
        id: &TeamId,
        opts: DecommissionOptions,
    ) -> Result<DecommissionReport> {
        let team = self.require(id).await?;
        if !team.status.occupies_slot() {
            return Err(LifecycleError::InvalidStatus {
                team: team.id,
                status: team.status,
            });
        }

        if let Some(target) = &opts.transfer_to {
            self.transfer_state(&team, target).await?;
        }

        let mut resources = self
            .provider_call("list_team_resources", self.provider.list_team_resources(id))
            .await?;
        if opts.backup {
            resources.retain(|r| !matches!(r.kind, ResourceKind::Bucket | ResourceKind::LockTable));
        }
        resources.sort_by_key(|r| deletion_rank(r.kind));

        let destruction = self
            .guard
            .guarded_destroy(DestroyPlan {
                subject: team.id.to_string(),
                team: Some(team.id.clone()),
                environment: team.environment,
                resources,
                take_backup: opts.backup,
                force: opts.force,
            })
            .await?;

        // Destruction succeeded; everything past this point is
        // bookkeeping on our own stores.
        self.registry
            .update(id, Box::new(|t| t.status = TeamStatus::Decommissioning))
            .await?;
        self.secrets.delete(id).await?;
        let team = self
            .registry
            .update(id, Box::new(|t| t.status = TeamStatus::Decommissioned))
            .await?;
        self.claims.release(team.numeric_id).await?;

        self.emit(CellEventEnvelope::info(CellEvent::TeamDecommissioned {
            team: team.id.clone(),
            freed_numeric_id: team.numeric_id,
        }));
        info!(
            team = %team.id,
            freed_numeric_id = team.numeric_id,
            "Team decommissioned"
        );

        Ok(DecommissionReport {
            team: team.id,
            freed_numeric_id: team.numeric_id,
            transferred_to: opts.transfer_to,
            destruction,
        })
    }

    // --- Generic stack path, independent of teams ---

    /// Preview what a stack teardown would remove.
    pub async fn stack_plan(&self, stack: &str) -> Result<ImpactReport> {
        let resources = self
            .provider_call(
                "list_stack_resources",
                self.provider.list_stack_resources(stack),
            )
            .await?;
        Ok(self.guard.plan_impact(&resources))
    }

    /// Apply a named stack's resources for an environment.
    #[instrument(skip(self))]
    pub async fn stack_apply(
        &self,
        stack: &str,
        environment: Environment,
    ) -> Result<Vec<ResourceRef>> {
        Ok(self
            .provider_call("apply_stack", self.provider.apply_stack(stack, environment))
            .await?)
    }

    /// Tear down a stack through the same guard the team path uses.
    #[instrument(skip(self))]
    pub async fn stack_destroy(
        &self,
        stack: &str,
        environment: Environment,
        backup: bool,
        force: bool,
    ) -> Result<DestructionReport> {
        let mut resources = self
            .provider_call(
                "list_stack_resources",
                self.provider.list_stack_resources(stack),
            )
            .await?;
        resources.sort_by_key(|r| deletion_rank(r.kind));

        Ok(self
            .guard
            .guarded_destroy(DestroyPlan {
                subject: stack.to_string(),
                team: None,
                environment,
                resources,
                take_backup: backup,
                force,
            })
            .await?)
    }

    // --- Internal helpers ---

    /// Merge the team's state document into the target team's, under a
    /// `transferred_state` key so nothing of the target's own state is
    /// clobbered. One conditional on success: any failure aborts the
    /// caller before deletions start.
    async fn transfer_state(&self, team: &Team, target: &TeamId) -> Result<()> {
        let target_team = self.require(target).await?;
        if !target_team.status.occupies_slot() {
            return Err(LifecycleError::Validation(format!(
                "transfer target {} is decommissioned",
                target
            )));
        }

        let Some(source_doc) = self
            .provider_call(
                "read_state_doc",
                self.provider.read_state_doc(&team.id, team.environment),
            )
            .await?
        else {
            return Ok(());
        };
        let mut target_doc = self
            .provider_call(
                "read_state_doc",
                self.provider
                    .read_state_doc(&target_team.id, target_team.environment),
            )
            .await?
            .ok_or_else(|| {
                LifecycleError::Validation(format!(
                    "transfer target {} has no state backend",
                    target
                ))
            })?;

        target_doc["transferred_state"][team.id.to_string()] = source_doc;
        self.provider_call(
            "write_state_doc",
            self.provider
                .write_state_doc(&target_team.id, target_team.environment, target_doc),
        )
        .await?;
        info!(team = %team.id, target = %target, "State transferred");
        Ok(())
    }

    /// Bound direct provider calls by the configured call timeout, the
    /// same budget the provisioner and orchestrator apply to theirs.
    async fn provider_call<T>(
        &self,
        operation: &str,
        call: impl std::future::Future<Output = cell_provider::Result<T>>,
    ) -> cell_provider::Result<T> {
        tokio::time::timeout(self.config.provider_timeout, call)
            .await
            .map_err(|_| ProviderError::Timeout {
                operation: operation.to_string(),
            })
            .and_then(|r| r)
    }

    async fn require(&self, id: &TeamId) -> Result<Team> {
        self.registry
            .get(id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound(id.clone()))
    }

    async fn require_active(&self, id: &TeamId) -> Result<Team> {
        let team = self.require(id).await?;
        if team.status != TeamStatus::Active {
            return Err(LifecycleError::InvalidStatus {
                team: team.id,
                status: team.status,
            });
        }
        Ok(team)
    }

    fn emit(&self, envelope: CellEventEnvelope) {
        let _ = self.event_tx.send(envelope);
    }
}

fn deployable(status: TeamStatus) -> bool {
    matches!(
        status,
        TeamStatus::Provisioning | TeamStatus::Active | TeamStatus::Scaling | TeamStatus::Rotating
    )
}

/// Services and roles go before storage so a half-finished teardown never
/// leaves a running service without its state backend.
fn deletion_rank(kind: ResourceKind) -> u8 {
    match kind {
        ResourceKind::Service => 0,
        ResourceKind::LoadBalancer => 1,
        ResourceKind::BudgetAlert => 2,
        ResourceKind::SecretsBundle => 3,
        ResourceKind::Other => 4,
        ResourceKind::Role => 5,
        ResourceKind::Bucket => 6,
        ResourceKind::LockTable => 7,
    }
}

/// Pipe a component's event stream into the unified channel.
fn forward_events(
    mut rx: broadcast::Receiver<CellEventEnvelope>,
    tx: broadcast::Sender<CellEventEnvelope>,
) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(envelope) => {
                    if tx.send(envelope).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use cell_guard::{AutoApprove, DenyAll, GuardError};
    use cell_provider::InMemoryCloudProvider;
    use cell_registry::{InMemorySlotClaims, InMemoryTeamRegistry};
    use cell_secrets::InMemoryBundleStore;
    use cell_types::{Environment, HealthState};
    use std::time::Duration;

    struct Fixture {
        operator: LifecycleOperator,
        provider: Arc<InMemoryCloudProvider>,
    }

    fn fixture_with(confirmer: Arc<dyn Confirmer>) -> Fixture {
        let mut config = OrgConfig::new("acme", "us-east-1");
        config.health_poll.max_attempts = 2;
        config.health_poll.interval = Duration::from_millis(5);
        config.provider_timeout = Duration::from_millis(50);

        let registry = Arc::new(InMemoryTeamRegistry::new());
        let claims = Arc::new(InMemorySlotClaims::new());
        let provider = Arc::new(InMemoryCloudProvider::new());
        let operator = LifecycleOperator::new(
            config,
            registry.clone(),
            claims,
            provider.clone(),
            Arc::new(InMemoryBundleStore::new()),
            confirmer,
        );
        Fixture { operator, provider }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(AutoApprove))
    }

    fn request(slug: &str) -> OnboardRequest {
        let mut request = OnboardRequest::new(
            TeamId::new(slug).unwrap(),
            "cc-100",
            Environment::Dev,
        );
        request.leads.insert("alice@acme.example".into());
        request
    }

    async fn onboarded_and_deployed(f: &Fixture, slug: &str) -> TeamId {
        let id = TeamId::new(slug).unwrap();
        f.operator.onboard(request(slug)).await.unwrap();
        f.operator.deploy(&id).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_onboard_then_deploy_activates_team() {
        let f = fixture();
        let id = onboarded_and_deployed(&f, "payments").await;

        let team = f.operator.get_team(&id).await.unwrap();
        assert_eq!(team.status, TeamStatus::Active);

        let report = f.operator.diagnose(&id).await.unwrap();
        assert_eq!(report.bundle_version, Some(1));
        assert_eq!(report.service.unwrap().desired, 1);
    }

    #[tokio::test]
    async fn test_decommission_frees_id_for_reuse() {
        let f = fixture();
        let id = onboarded_and_deployed(&f, "payments").await;

        let report = f
            .operator
            .decommission(
                &id,
                DecommissionOptions {
                    backup: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(report.freed_numeric_id, 1);
        assert!(report.destruction.backup.is_some());

        let team = f.operator.get_team(&id).await.unwrap();
        assert_eq!(team.status, TeamStatus::Decommissioned);

        // The freed id is handed to the next team.
        let outcome = f.operator.onboard(request("data")).await.unwrap();
        assert_eq!(outcome.team.numeric_id, 1);
    }

    #[tokio::test]
    async fn test_scale_updates_tier_and_descriptor() {
        let f = fixture();
        let id = onboarded_and_deployed(&f, "payments").await;

        let record = f.operator.scale(&id, Tier::Large).await.unwrap();

        assert_eq!(record.descriptor.cpu, 1024);
        assert_eq!(record.descriptor.memory, 2048);
        assert_eq!(record.descriptor.replicas, 3);

        let team = f.operator.get_team(&id).await.unwrap();
        assert_eq!(team.tier, Tier::Large);
        assert_eq!(team.status, TeamStatus::Active);
    }

    #[tokio::test]
    async fn test_scale_requires_active_team() {
        let f = fixture();
        f.operator.onboard(request("payments")).await.unwrap();
        let id = TeamId::new("payments").unwrap();

        // Provisioned but never deployed.
        let err = f.operator.scale(&id, Tier::Large).await.unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidStatus { .. }));
    }

    #[tokio::test]
    async fn test_rotate_single_key_bumps_version_once() {
        let f = fixture();
        let id = onboarded_and_deployed(&f, "payments").await;

        let report = f
            .operator
            .rotate(
                &id,
                BTreeMap::from([("github_token".into(), "ghp_new".into())]),
                false,
            )
            .await
            .unwrap();

        assert_eq!(report.bundle_version, 2);
        assert_eq!(report.keys, vec!["github_token".to_string()]);
        assert_eq!(report.deployment.health, HealthState::Healthy);

        let team = f.operator.get_team(&id).await.unwrap();
        assert_eq!(team.status, TeamStatus::Active);
    }

    #[tokio::test]
    async fn test_diagnose_bounds_stalled_provider_calls() {
        let f = fixture();
        let id = onboarded_and_deployed(&f, "payments").await;
        f.provider.stall_on("describe_service");

        let report = tokio::time::timeout(Duration::from_secs(2), f.operator.diagnose(&id))
            .await
            .expect("diagnose must not hang")
            .unwrap();

        assert!(report.service.is_none());
        assert!(report
            .findings
            .iter()
            .any(|finding| finding.contains("timed out")));
    }

    #[tokio::test]
    async fn test_failed_scale_deploy_restores_active_and_tier() {
        let f = fixture();
        let id = onboarded_and_deployed(&f, "payments").await;
        f.provider.fail_on("apply_service", "capacity exhausted");

        let err = f.operator.scale(&id, Tier::Large).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Orchestrator(_)));

        let team = f.operator.get_team(&id).await.unwrap();
        assert_eq!(team.status, TeamStatus::Active);
        assert_eq!(team.tier, Tier::Small);

        // The team is immediately retryable.
        f.provider.clear_failure("apply_service");
        f.operator.scale(&id, Tier::Large).await.unwrap();
        let team = f.operator.get_team(&id).await.unwrap();
        assert_eq!(team.tier, Tier::Large);
    }

    #[tokio::test]
    async fn test_failed_rotate_deploy_restores_active() {
        let f = fixture();
        let id = onboarded_and_deployed(&f, "payments").await;
        f.provider.fail_on("apply_service", "capacity exhausted");

        let err = f
            .operator
            .rotate(
                &id,
                BTreeMap::from([("github_token".into(), "ghp_new".into())]),
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Orchestrator(_)));

        let team = f.operator.get_team(&id).await.unwrap();
        assert_eq!(team.status, TeamStatus::Active);

        // The bundle write stays committed; the retry redeploys at the
        // already-bumped version.
        f.provider.clear_failure("apply_service");
        let report = f
            .operator
            .rotate(
                &id,
                BTreeMap::from([("github_token".into(), "ghp_newer".into())]),
                false,
            )
            .await
            .unwrap();
        assert_eq!(report.bundle_version, 3);
    }

    #[tokio::test]
    async fn test_diagnose_leaves_last_modified_untouched() {
        let f = fixture();
        let id = onboarded_and_deployed(&f, "payments").await;
        let before = f.operator.get_team(&id).await.unwrap().last_modified;

        f.operator.diagnose(&id).await.unwrap();

        let after = f.operator.get_team(&id).await.unwrap().last_modified;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_decommission_protected_team_blocked_without_force() {
        let f = fixture();
        f.provider.tag_new_resources("cellkit:protected", "true");
        let id = onboarded_and_deployed(&f, "payments").await;

        let err = f
            .operator
            .decommission(
                &id,
                DecommissionOptions {
                    backup: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Guard(GuardError::ProtectedResourceBlocked { .. })
        ));

        // Zero deletions, status untouched.
        assert!(f
            .provider
            .role_exists("acme-payments-cell-role")
            .await
            .unwrap());
        let team = f.operator.get_team(&id).await.unwrap();
        assert_eq!(team.status, TeamStatus::Active);

        // Force proceeds.
        let report = f
            .operator
            .decommission(
                &id,
                DecommissionOptions {
                    backup: true,
                    force: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(report.freed_numeric_id, 1);
        assert!(!f
            .provider
            .role_exists("acme-payments-cell-role")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_declined_confirmation_changes_nothing() {
        let f = fixture_with(Arc::new(DenyAll));
        let id = onboarded_and_deployed(&f, "payments").await;

        let err = f
            .operator
            .decommission(
                &id,
                DecommissionOptions {
                    backup: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Guard(GuardError::ConfirmationDeclined(_))
        ));

        assert!(f
            .provider
            .role_exists("acme-payments-cell-role")
            .await
            .unwrap());
        let team = f.operator.get_team(&id).await.unwrap();
        assert_eq!(team.status, TeamStatus::Active);
    }

    #[tokio::test]
    async fn test_decommission_without_backup_trips_lock_table_protection() {
        let f = fixture();
        let id = onboarded_and_deployed(&f, "payments").await;

        let err = f
            .operator
            .decommission(&id, DecommissionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Guard(GuardError::ProtectedResourceBlocked { .. })
        ));
    }

    #[tokio::test]
    async fn test_transfer_to_unknown_target_aborts_before_deletion() {
        let f = fixture();
        let id = onboarded_and_deployed(&f, "payments").await;

        let err = f
            .operator
            .decommission(
                &id,
                DecommissionOptions {
                    backup: true,
                    transfer_to: Some(TeamId::new("ghost").unwrap()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));

        assert!(f
            .provider
            .role_exists("acme-payments-cell-role")
            .await
            .unwrap());
        let team = f.operator.get_team(&id).await.unwrap();
        assert_eq!(team.status, TeamStatus::Active);
    }

    #[tokio::test]
    async fn test_transfer_merges_state_into_target() {
        let f = fixture();
        let source = onboarded_and_deployed(&f, "payments").await;
        let target = onboarded_and_deployed(&f, "data").await;

        f.operator
            .decommission(
                &source,
                DecommissionOptions {
                    backup: true,
                    transfer_to: Some(target.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let doc = f
            .provider
            .read_state_doc(&target, Environment::Dev)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["transferred_state"]["payments"]["numeric_id"], 1);
        // The target's own outputs are intact.
        assert_eq!(doc["numeric_id"], 2);
    }

    #[tokio::test]
    async fn test_onboard_many_collects_failures() {
        let f = fixture();
        let mut requests: Vec<OnboardRequest> =
            ["payments", "data", "search", "infra"].iter().map(|s| request(s)).collect();
        let mut bad = request("broken");
        bad.leads.clear();
        requests.push(bad);

        let summary = f.operator.onboard_many(requests).await;

        assert_eq!(summary.succeeded.len(), 4);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0.to_string(), "broken");

        let mut ids: Vec<u8> = summary.succeeded.iter().map(|o| o.team.numeric_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[tokio::test]
    async fn test_set_budget_configures_alerts() {
        let f = fixture();
        let id = onboarded_and_deployed(&f, "payments").await;

        let team = f
            .operator
            .set_budget(&id, 5000.0, vec![50, 80, 100])
            .await
            .unwrap();
        assert_eq!(team.budget_monthly, Some(5000.0));

        let alerts = f.provider.configured_budget(&id).unwrap();
        assert_eq!(alerts.cost_center, "cc-100");
        assert_eq!(alerts.alert_thresholds, vec![50, 80, 100]);
    }

    #[tokio::test]
    async fn test_events_from_components_surface_on_one_stream() {
        let f = fixture();
        let mut events = f.operator.subscribe();
        onboarded_and_deployed(&f, "payments").await;

        // Give the forwarding tasks a beat.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut saw_onboarded = false;
        let mut saw_applied = false;
        while let Ok(envelope) = events.try_recv() {
            match envelope.event {
                CellEvent::TeamOnboarded { .. } => saw_onboarded = true,
                CellEvent::DeploymentApplied { .. } => saw_applied = true,
                _ => {}
            }
        }
        assert!(saw_onboarded);
        assert!(saw_applied);
    }

    #[tokio::test]
    async fn test_stack_path_carries_the_guard() {
        let f = fixture();
        f.operator
            .stack_apply("shared-ci", Environment::Dev)
            .await
            .unwrap();

        let plan = f.operator.stack_plan("shared-ci").await.unwrap();
        assert_eq!(plan.total, 2);

        let report = f
            .operator
            .stack_destroy("shared-ci", Environment::Dev, false, false)
            .await
            .unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(f.operator.stack_plan("shared-ci").await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_stack_destroy_blocks_on_protected_names() {
        let f = fixture();
        f.operator
            .stack_apply("audit-trail", Environment::Prod)
            .await
            .unwrap();

        let err = f
            .operator
            .stack_destroy("audit-trail", Environment::Prod, false, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Guard(GuardError::ProtectedResourceBlocked { .. })
        ));
        assert_eq!(f.operator.stack_plan("audit-trail").await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_deploy_unknown_team_fails() {
        let f = fixture();
        let err = f
            .operator
            .deploy(&TeamId::new("ghost").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));
    }
}
