//! Automation Orchestrator - create-or-replace deployment with bounded
//! health polling
//!
//! Deployment is always whole-descriptor: the desired state is rebuilt
//! from the team record and the provisioner's state document, then handed
//! to the container service as one apply. Health polling afterwards is
//! bounded and non-fatal; a deployment that never reports healthy within
//! the window is returned as `Unknown` with a warning, because container
//! services routinely converge after the caller stops watching.

use crate::error::{OrchestratorError, Result};
use cell_provider::{CloudProvider, ProviderError};
use cell_types::{
    CellEvent, CellEventEnvelope, DeploymentDescriptor, DeploymentRecord, HealthState, OrgConfig,
    Team,
};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{info, instrument, warn};

/// Applies automation-server deployments and observes their health
pub struct AutomationOrchestrator {
    config: OrgConfig,
    provider: Arc<dyn CloudProvider>,
    event_tx: broadcast::Sender<CellEventEnvelope>,
}

impl AutomationOrchestrator {
    pub fn new(config: OrgConfig, provider: Arc<dyn CloudProvider>) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            config,
            provider,
            event_tx,
        }
    }

    /// Subscribe to deployment events.
    pub fn subscribe(&self) -> broadcast::Receiver<CellEventEnvelope> {
        self.event_tx.subscribe()
    }

    /// Deploy (or redeploy) a team's automation server and wait for it to
    /// report healthy, up to the configured polling window.
    pub async fn deploy(&self, team: &Team) -> Result<DeploymentRecord> {
        // Never cancelled; the sender is held for the duration of the call.
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.deploy_cancellable(team, cancel_rx).await
    }

    /// Like [`deploy`](Self::deploy), but abandons health polling when
    /// `cancel` flips to `true`. The apply itself always completes; only
    /// the wait is interruptible, and an interrupted wait reports
    /// `Unknown`.
    #[instrument(skip(self, team, cancel), fields(team = %team.id))]
    pub async fn deploy_cancellable(
        &self,
        team: &Team,
        cancel: watch::Receiver<bool>,
    ) -> Result<DeploymentRecord> {
        let descriptor = self.descriptor_for(team).await?;
        let service = self
            .config
            .naming
            .service_name(&team.id, team.environment);

        // Create-or-replace: the container service reconciles the whole
        // descriptor, so redeploys and first deploys are the same call.
        let endpoint_url = self
            .provider_call(
                "apply_service",
                self.provider.apply_service(&service, &descriptor),
            )
            .await?;
        let applied_at = chrono::Utc::now();

        self.emit(CellEventEnvelope::info(CellEvent::DeploymentApplied {
            team: team.id.clone(),
            tier: descriptor.tier,
            endpoint_url: endpoint_url.clone(),
        }));
        info!(
            team = %team.id,
            service = %service,
            endpoint = %endpoint_url,
            replicas = descriptor.replicas,
            "Deployment applied"
        );

        let health = self.poll_health(team, &endpoint_url, cancel).await;

        Ok(DeploymentRecord {
            descriptor,
            endpoint_url,
            health,
            applied_at,
        })
    }

    /// Build the desired-state descriptor from the tier sizing table and
    /// the provisioner's published outputs.
    async fn descriptor_for(&self, team: &Team) -> Result<DeploymentDescriptor> {
        let doc = self
            .provider_call(
                "read_state_doc",
                self.provider.read_state_doc(&team.id, team.environment),
            )
            .await?
            .ok_or_else(|| OrchestratorError::StateDocMissing {
                team: team.id.clone(),
                environment: team.environment,
            })?;

        let mut descriptor = DeploymentDescriptor::for_tier(
            team.id.clone(),
            team.environment,
            team.tier,
            &self.config.automation_image,
            self.config.naming.secrets_ref(&team.id),
        );

        let network_range = doc
            .get("network_range")
            .and_then(|v| v.as_str())
            .ok_or_else(|| OrchestratorError::StateDocIncomplete {
                team: team.id.clone(),
                field: "network_range",
            })?;
        let region = doc
            .get("region")
            .and_then(|v| v.as_str())
            .ok_or_else(|| OrchestratorError::StateDocIncomplete {
                team: team.id.clone(),
                field: "region",
            })?;

        descriptor
            .env_vars
            .insert("CELL_NETWORK_RANGE".into(), network_range.to_string());
        descriptor
            .env_vars
            .insert("CELL_REGION".into(), region.to_string());
        descriptor
            .env_vars
            .insert("CELL_NUMERIC_ID".into(), team.numeric_id.to_string());
        descriptor
            .env_vars
            .insert("CELL_TEAM".into(), team.id.to_string());

        Ok(descriptor)
    }

    /// Poll the health endpoint at a fixed interval until it reports
    /// healthy, the attempt budget runs out, or the caller cancels.
    /// Probe errors count as unhealthy observations, not failures.
    async fn poll_health(
        &self,
        team: &Team,
        endpoint_url: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> HealthState {
        let poll = &self.config.health_poll;

        for attempt in 1..=poll.max_attempts {
            let probe =
                tokio::time::timeout(poll.probe_timeout, self.provider.probe_endpoint(endpoint_url))
                    .await;
            match probe {
                Ok(Ok(true)) => {
                    info!(team = %team.id, attempt, "Deployment reported healthy");
                    return HealthState::Healthy;
                }
                Ok(Ok(false)) => {}
                Ok(Err(err)) => {
                    warn!(team = %team.id, attempt, error = %err, "Health probe failed");
                }
                Err(_) => {
                    warn!(team = %team.id, attempt, "Health probe timed out");
                }
            }

            if attempt < poll.max_attempts {
                tokio::select! {
                    _ = tokio::time::sleep(poll.interval) => {}
                    _ = cancel.changed() => {
                        if *cancel.borrow() {
                            warn!(team = %team.id, attempt, "Health polling cancelled");
                            return HealthState::Unknown;
                        }
                    }
                }
            }
        }

        warn!(
            team = %team.id,
            attempts = poll.max_attempts,
            "Deployment did not report healthy within the polling window"
        );
        self.emit(CellEventEnvelope::warning(
            CellEvent::DeploymentHealthUnknown {
                team: team.id.clone(),
                attempts: poll.max_attempts,
            },
        ));
        HealthState::Unknown
    }

    /// Run one provider call under the configured timeout.
    async fn provider_call<T>(
        &self,
        operation: &str,
        call: impl std::future::Future<Output = cell_provider::Result<T>>,
    ) -> Result<T> {
        let outcome = tokio::time::timeout(self.config.provider_timeout, call)
            .await
            .map_err(|_| ProviderError::Timeout {
                operation: operation.to_string(),
            })
            .and_then(|r| r)?;
        Ok(outcome)
    }

    fn emit(&self, envelope: CellEventEnvelope) {
        let _ = self.event_tx.send(envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cell_provider::InMemoryCloudProvider;
    use cell_types::{Environment, TeamId, TeamStatus, Tier};
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn team(slug: &str, tier: Tier) -> Team {
        let now = chrono::Utc::now();
        Team {
            id: TeamId::new(slug).unwrap(),
            numeric_id: 7,
            status: TeamStatus::Provisioning,
            org: "acme".into(),
            cost_center: "cc-100".into(),
            budget_monthly: None,
            environment: Environment::Dev,
            region: "us-east-1".into(),
            leads: BTreeSet::from(["alice@acme.example".into()]),
            network_range: "10.7.0.0/16".into(),
            tier,
            created_at: now,
            last_modified: now,
        }
    }

    fn config() -> OrgConfig {
        let mut config = OrgConfig::new("acme", "us-east-1");
        config.health_poll.max_attempts = 3;
        config.health_poll.interval = Duration::from_millis(10);
        config
    }

    async fn seed_state_doc(provider: &InMemoryCloudProvider, team: &Team) {
        provider
            .write_state_doc(
                &team.id,
                team.environment,
                serde_json::json!({
                    "numeric_id": team.numeric_id,
                    "network_range": team.network_range,
                    "region": team.region,
                }),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deploy_builds_descriptor_from_tier_and_state_doc() {
        let provider = Arc::new(InMemoryCloudProvider::new());
        let orchestrator = AutomationOrchestrator::new(config(), provider.clone());
        let team = team("payments", Tier::Medium);
        seed_state_doc(&provider, &team).await;

        let record = orchestrator.deploy(&team).await.unwrap();

        assert_eq!(record.descriptor.cpu, 512);
        assert_eq!(record.descriptor.memory, 1024);
        assert_eq!(record.descriptor.replicas, 2);
        assert_eq!(
            record.descriptor.secrets_ref,
            "acme/payments/credential-bundle"
        );
        assert_eq!(
            record.descriptor.env_vars["CELL_NETWORK_RANGE"],
            "10.7.0.0/16"
        );
        assert_eq!(record.descriptor.env_vars["CELL_REGION"], "us-east-1");
        assert_eq!(
            record.endpoint_url,
            "https://acme-payments-dev-automation.cells.example.com"
        );
    }

    #[tokio::test]
    async fn test_deploy_without_state_doc_is_an_error() {
        let provider = Arc::new(InMemoryCloudProvider::new());
        let orchestrator = AutomationOrchestrator::new(config(), provider);
        let team = team("payments", Tier::Small);

        let err = orchestrator.deploy(&team).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::StateDocMissing { .. }));
    }

    #[tokio::test]
    async fn test_healthy_deployment_reports_healthy() {
        let provider = Arc::new(InMemoryCloudProvider::new());
        let orchestrator = AutomationOrchestrator::new(config(), provider.clone());
        let team = team("payments", Tier::Small);
        seed_state_doc(&provider, &team).await;

        let record = orchestrator.deploy(&team).await.unwrap();

        assert_eq!(record.health, HealthState::Healthy);
        assert!(provider.probe_calls() >= 1);
    }

    #[tokio::test]
    async fn test_exhausted_polling_reports_unknown_not_error() {
        let provider = Arc::new(InMemoryCloudProvider::new());
        let orchestrator = AutomationOrchestrator::new(config(), provider.clone());
        let team = team("payments", Tier::Small);
        seed_state_doc(&provider, &team).await;
        provider.set_service_healthy("acme-payments-dev-automation", false);

        let mut events = orchestrator.subscribe();
        let record = orchestrator.deploy(&team).await.unwrap();

        assert_eq!(record.health, HealthState::Unknown);
        assert_eq!(provider.probe_calls(), 3);

        // The warning is observable on the event stream.
        let mut saw_warning = false;
        while let Ok(envelope) = events.try_recv() {
            if matches!(envelope.event, CellEvent::DeploymentHealthUnknown { attempts, .. } if attempts == 3)
            {
                saw_warning = true;
            }
        }
        assert!(saw_warning);
    }

    #[tokio::test]
    async fn test_cancelled_polling_returns_unknown_promptly() {
        let provider = Arc::new(InMemoryCloudProvider::new());
        let mut config = config();
        config.health_poll.max_attempts = 10;
        config.health_poll.interval = Duration::from_secs(60);
        let orchestrator = AutomationOrchestrator::new(config, provider.clone());
        let team = team("payments", Tier::Small);
        seed_state_doc(&provider, &team).await;
        provider.set_service_healthy("acme-payments-dev-automation", false);

        let (cancel_tx, cancel_rx) = watch::channel(false);
        cancel_tx.send(true).unwrap();

        let record = orchestrator.deploy_cancellable(&team, cancel_rx).await.unwrap();
        assert_eq!(record.health, HealthState::Unknown);
        assert_eq!(provider.probe_calls(), 1);
    }

    #[tokio::test]
    async fn test_redeploy_replaces_the_whole_descriptor() {
        let provider = Arc::new(InMemoryCloudProvider::new());
        let orchestrator = AutomationOrchestrator::new(config(), provider.clone());
        let mut team = team("payments", Tier::Small);
        seed_state_doc(&provider, &team).await;

        orchestrator.deploy(&team).await.unwrap();
        team.tier = Tier::Large;
        let record = orchestrator.deploy(&team).await.unwrap();

        assert_eq!(record.descriptor.replicas, 3);
        let status = provider
            .describe_service("acme-payments-dev-automation")
            .await
            .unwrap();
        assert_eq!(status.desired, 3);
    }
}
