//! Safety guard state machine
//!
//! `check_protected → analyze_impact → backup → confirm → execute →
//! report`. The first three phases are read-only; nothing is deleted
//! until the operator has confirmed against the impact summary.

use crate::backup::{self, BackupArtifact};
use crate::confirm::Confirmer;
use crate::error::{GuardError, Result};
use crate::matcher::ProtectedMatcher;
use cell_provider::{CloudProvider, ProviderError, ResourceRef};
use cell_types::{
    CellEvent, CellEventEnvelope, Environment, NamingConventions, OrgConfig, TeamId,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

/// A destructive operation awaiting the guard's verdict
#[derive(Debug, Clone)]
pub struct DestroyPlan {
    /// Human-readable subject, retyped verbatim for critical confirmation
    pub subject: String,

    /// Owning team, when the subject is a team
    pub team: Option<TeamId>,

    pub environment: Environment,

    /// Resources to delete, in deletion order
    pub resources: Vec<ResourceRef>,

    /// Capture a pre-destruction snapshot before confirming
    pub take_backup: bool,

    /// Override protected-pattern vetoes
    pub force: bool,
}

/// Candidate resources grouped by kind
#[derive(Debug, Clone, serde::Serialize)]
pub struct ImpactReport {
    pub total: usize,
    pub by_kind: BTreeMap<String, usize>,
}

impl ImpactReport {
    pub fn summarize(resources: &[ResourceRef]) -> Self {
        let mut by_kind = BTreeMap::new();
        for resource in resources {
            *by_kind.entry(resource.kind.to_string()).or_insert(0) += 1;
        }
        Self {
            total: resources.len(),
            by_kind,
        }
    }

    /// One-line summary for confirmation prompts and logs.
    pub fn summary_line(&self) -> String {
        let groups: Vec<String> = self
            .by_kind
            .iter()
            .map(|(kind, count)| format!("{count} {kind}"))
            .collect();
        format!("{} resources ({})", self.total, groups.join(", "))
    }
}

/// What a completed guarded destruction did
#[derive(Debug, serde::Serialize)]
pub struct DestructionReport {
    pub subject: String,
    pub impact: ImpactReport,
    pub deleted: Vec<ResourceRef>,
    pub backup: Option<BackupArtifact>,
}

/// Gatekeeper for every deletion path
pub struct SafetyGuard {
    matcher: ProtectedMatcher,
    naming: NamingConventions,
    provider: Arc<dyn CloudProvider>,
    confirmer: Arc<dyn Confirmer>,
    provider_timeout: Duration,
    event_tx: broadcast::Sender<CellEventEnvelope>,
}

impl SafetyGuard {
    pub fn new(
        config: &OrgConfig,
        provider: Arc<dyn CloudProvider>,
        confirmer: Arc<dyn Confirmer>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            matcher: ProtectedMatcher::new(&config.protected_patterns),
            naming: config.naming.clone(),
            provider,
            confirmer,
            provider_timeout: config.provider_timeout,
            event_tx,
        }
    }

    /// Subscribe to guard events.
    pub fn subscribe(&self) -> broadcast::Receiver<CellEventEnvelope> {
        self.event_tx.subscribe()
    }

    /// Read-only impact preview, used by plan-style commands.
    pub fn plan_impact(&self, resources: &[ResourceRef]) -> ImpactReport {
        ImpactReport::summarize(resources)
    }

    /// Run a destroy plan through the full guard state machine.
    #[instrument(skip(self, plan), fields(subject = %plan.subject))]
    pub async fn guarded_destroy(&self, plan: DestroyPlan) -> Result<DestructionReport> {
        // 1. Protected check. A match blocks the whole plan; force
        //    downgrades the veto to a warning.
        if let Some((resource, pattern)) = self.matcher.any_protected(&plan.resources) {
            if plan.force {
                warn!(
                    resource = %resource.name,
                    pattern = %pattern,
                    "Protected match overridden by force"
                );
            } else {
                self.emit(CellEventEnvelope::error(CellEvent::GuardVeto {
                    team: plan.team.clone(),
                    resource: resource.name.clone(),
                    pattern: pattern.clone(),
                }));
                return Err(GuardError::ProtectedResourceBlocked {
                    resource: resource.name.clone(),
                    pattern,
                });
            }
        }

        // 2. Impact analysis.
        let impact = ImpactReport::summarize(&plan.resources);
        info!(subject = %plan.subject, impact = %impact.summary_line(), "Destruction impact");

        // 3. Optional backup, before any confirmation so the operator
        //    sees the location in the prompt context.
        let backup = if plan.take_backup {
            let artifact = backup::capture(
                self.provider.as_ref(),
                &plan.subject,
                plan.team.as_ref().map(|t| (t, plan.environment)),
                &plan.resources,
                self.backup_location(&plan),
                self.provider_timeout,
            )
            .await?;
            self.emit(CellEventEnvelope::info(CellEvent::BackupCreated {
                team: plan.team.clone(),
                location: artifact.location.clone(),
            }));
            Some(artifact)
        } else {
            None
        };

        // 4. Tiered confirmation.
        if !self.confirm(&plan, &impact).await {
            info!(subject = %plan.subject, "Destruction declined, nothing changed");
            return Err(GuardError::ConfirmationDeclined(plan.subject));
        }

        // 5. Execute, stopping at the first failure.
        let mut deleted = Vec::with_capacity(plan.resources.len());
        for resource in &plan.resources {
            if let Err(err) = self
                .provider_call("delete_resource", self.provider.delete_resource(resource))
                .await
            {
                warn!(
                    subject = %plan.subject,
                    resource = %resource.name,
                    error = %err,
                    deleted = deleted.len(),
                    "Destruction stopped on failure"
                );
                return Err(GuardError::PartialDestruction {
                    subject: plan.subject,
                    resource: resource.name.clone(),
                    reason: err.to_string(),
                    deleted: deleted.len(),
                    remaining: plan.resources.len() - deleted.len(),
                    backup_location: backup.map(|b| b.location),
                });
            }
            deleted.push(resource.clone());
        }

        info!(
            subject = %plan.subject,
            deleted = deleted.len(),
            "Destruction complete"
        );
        Ok(DestructionReport {
            subject: plan.subject,
            impact,
            deleted,
            backup,
        })
    }

    async fn confirm(&self, plan: &DestroyPlan, impact: &ImpactReport) -> bool {
        let summary = format!(
            "Destroy {} in {}: {}",
            plan.subject,
            plan.environment,
            impact.summary_line()
        );
        if plan.environment.is_critical() {
            // Critical environments: retype the subject, then a final
            // yes/no. Interactive confirmers add their own countdown.
            self.confirmer
                .confirm_typed(&summary, &plan.subject)
                .await
                && self
                    .confirmer
                    .confirm(&format!("{summary}. This cannot be undone. Proceed?"))
                    .await
        } else {
            self.confirmer.confirm(&format!("{summary}. Proceed?")).await
        }
    }

    /// Bound every provider call by the configured call timeout.
    async fn provider_call<T>(
        &self,
        operation: &str,
        call: impl std::future::Future<Output = cell_provider::Result<T>>,
    ) -> cell_provider::Result<T> {
        tokio::time::timeout(self.provider_timeout, call)
            .await
            .map_err(|_| ProviderError::Timeout {
                operation: operation.to_string(),
            })
            .and_then(|r| r)
    }

    fn backup_location(&self, plan: &DestroyPlan) -> String {
        let timestamp = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        match &plan.team {
            Some(team) => self.naming.backup_location(team, &timestamp),
            None => format!("{}-backups/{}/{}", self.naming.prefix, plan.subject, timestamp),
        }
    }

    fn emit(&self, envelope: CellEventEnvelope) {
        let _ = self.event_tx.send(envelope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::{AutoApprove, DenyAll};
    use cell_provider::{InMemoryCloudProvider, ResourceKind};

    async fn seeded_provider(team: &TeamId) -> Arc<InMemoryCloudProvider> {
        let provider = Arc::new(InMemoryCloudProvider::new());
        provider
            .create_role(team, "acme-payments-cell-role", "boundary")
            .await
            .unwrap();
        provider
            .create_state_bucket(team, "acme-payments-dev-tfstate", "acme-payments-cell-role")
            .await
            .unwrap();
        provider
    }

    fn plan(resources: Vec<ResourceRef>, force: bool) -> DestroyPlan {
        DestroyPlan {
            subject: "payments".into(),
            team: Some(TeamId::new("payments").unwrap()),
            environment: Environment::Dev,
            resources,
            take_backup: false,
            force,
        }
    }

    fn guard(provider: Arc<InMemoryCloudProvider>, confirmer: Arc<dyn Confirmer>) -> SafetyGuard {
        SafetyGuard::new(&OrgConfig::new("acme", "us-east-1"), provider, confirmer)
    }

    #[tokio::test]
    async fn test_protected_match_blocks_without_force() {
        let team = TeamId::new("payments").unwrap();
        let provider = seeded_provider(&team).await;
        let guard = guard(provider.clone(), Arc::new(AutoApprove));

        let resources = vec![
            ResourceRef::new(ResourceKind::Role, "acme-payments-cell-role"),
            ResourceRef::new(ResourceKind::LockTable, "acme-payments-dev-tflock"),
        ];
        let err = guard.guarded_destroy(plan(resources, false)).await.unwrap_err();

        assert!(matches!(err, GuardError::ProtectedResourceBlocked { .. }));
        // Zero deletions happened.
        assert!(provider.role_exists("acme-payments-cell-role").await.unwrap());
    }

    #[tokio::test]
    async fn test_force_overrides_protected_match() {
        let team = TeamId::new("payments").unwrap();
        let provider = seeded_provider(&team).await;
        provider.create_lock_table(&team, "acme-payments-dev-tflock").await.unwrap();
        let guard = guard(provider.clone(), Arc::new(AutoApprove));

        let resources = vec![
            ResourceRef::new(ResourceKind::LockTable, "acme-payments-dev-tflock"),
            ResourceRef::new(ResourceKind::Role, "acme-payments-cell-role"),
        ];
        let report = guard.guarded_destroy(plan(resources, true)).await.unwrap();

        assert_eq!(report.deleted.len(), 2);
        assert!(!provider.role_exists("acme-payments-cell-role").await.unwrap());
        assert!(!provider.lock_table_exists("acme-payments-dev-tflock").await.unwrap());
    }

    #[tokio::test]
    async fn test_declined_confirmation_deletes_nothing() {
        let team = TeamId::new("payments").unwrap();
        let provider = seeded_provider(&team).await;
        let guard = guard(provider.clone(), Arc::new(DenyAll));

        let resources = vec![ResourceRef::new(ResourceKind::Role, "acme-payments-cell-role")];
        let err = guard.guarded_destroy(plan(resources, false)).await.unwrap_err();

        assert!(matches!(err, GuardError::ConfirmationDeclined(_)));
        assert!(provider.role_exists("acme-payments-cell-role").await.unwrap());
    }

    #[tokio::test]
    async fn test_partial_failure_reports_progress_and_stops() {
        let team = TeamId::new("payments").unwrap();
        let provider = seeded_provider(&team).await;
        provider.fail_on("delete_bucket", "bucket not empty");
        let guard = guard(provider.clone(), Arc::new(AutoApprove));

        let resources = vec![
            ResourceRef::new(ResourceKind::Role, "acme-payments-cell-role"),
            ResourceRef::new(ResourceKind::Bucket, "acme-payments-dev-tfstate"),
        ];
        let err = guard.guarded_destroy(plan(resources, false)).await.unwrap_err();

        match err {
            GuardError::PartialDestruction {
                resource,
                deleted,
                remaining,
                ..
            } => {
                assert_eq!(resource, "acme-payments-dev-tfstate");
                assert_eq!(deleted, 1);
                assert_eq!(remaining, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        // The role deletion is not rolled back.
        assert!(!provider.role_exists("acme-payments-cell-role").await.unwrap());
        assert!(provider.bucket_exists("acme-payments-dev-tfstate").await.unwrap());
    }

    #[tokio::test]
    async fn test_stalled_delete_is_bounded_by_the_call_timeout() {
        let team = TeamId::new("payments").unwrap();
        let provider = seeded_provider(&team).await;
        provider.stall_on("delete_resource");

        let mut config = OrgConfig::new("acme", "us-east-1");
        config.provider_timeout = std::time::Duration::from_millis(50);
        let guard = SafetyGuard::new(&config, provider.clone(), Arc::new(AutoApprove));

        let resources = vec![ResourceRef::new(ResourceKind::Role, "acme-payments-cell-role")];
        let err = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            guard.guarded_destroy(plan(resources, false)),
        )
        .await
        .expect("guarded_destroy must not hang")
        .unwrap_err();

        match err {
            GuardError::PartialDestruction { reason, deleted, .. } => {
                assert!(reason.contains("timed out"), "reason: {reason}");
                assert_eq!(deleted, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(provider.role_exists("acme-payments-cell-role").await.unwrap());
    }

    #[tokio::test]
    async fn test_backup_captured_before_deletion() {
        let team = TeamId::new("payments").unwrap();
        let provider = seeded_provider(&team).await;
        provider
            .write_state_doc(&team, Environment::Dev, serde_json::json!({"numeric_id": 1}))
            .await
            .unwrap();
        let guard = guard(provider.clone(), Arc::new(AutoApprove));

        let resources = vec![ResourceRef::new(ResourceKind::Role, "acme-payments-cell-role")];
        let mut destroy = plan(resources, false);
        destroy.take_backup = true;
        let report = guard.guarded_destroy(destroy).await.unwrap();

        let backup = report.backup.unwrap();
        assert!(backup.location.starts_with("acme-backups/payments/"));
        assert_eq!(backup.snapshot["state_doc"]["numeric_id"], 1);
    }

    #[tokio::test]
    async fn test_impact_groups_by_kind() {
        let resources = vec![
            ResourceRef::new(ResourceKind::Role, "r1"),
            ResourceRef::new(ResourceKind::Bucket, "b1"),
            ResourceRef::new(ResourceKind::Bucket, "b2"),
        ];
        let impact = ImpactReport::summarize(&resources);

        assert_eq!(impact.total, 3);
        assert_eq!(impact.by_kind["bucket"], 2);
        assert_eq!(impact.summary_line(), "3 resources (2 bucket, 1 role)");
    }
}
