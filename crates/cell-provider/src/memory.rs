//! In-memory cloud provider
//!
//! Records every resource it is asked to create and supports injected
//! failures per operation, so orchestration code can be tested for
//! idempotent resume and partial-failure reporting without a real cloud.

use crate::error::{ProviderError, Result};
use crate::provider::{
    BudgetAlerts, CloudProvider, ResourceKind, ResourceRef, ServiceStatus, TargetHealth,
};
use async_trait::async_trait;
use cell_types::{DeploymentDescriptor, Environment, TeamId};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Serializable dump of the fake control plane, so a local CLI can carry
/// its resources across invocations. Log lines and probe counters are
/// deliberately ephemeral.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProviderState {
    pub roles: BTreeMap<String, ResourceRef>,
    pub buckets: BTreeMap<String, ResourceRef>,
    pub lock_tables: BTreeMap<String, ResourceRef>,
    pub services: BTreeMap<String, (DeploymentDescriptor, String)>,
    pub stacks: BTreeMap<String, Vec<ResourceRef>>,
    pub state_docs: Vec<(TeamId, Environment, serde_json::Value)>,
    pub budgets: BTreeMap<TeamId, BudgetAlerts>,
    pub healthy: BTreeMap<String, bool>,
}

/// Tag key carrying the owning team on every recorded resource
pub const TEAM_TAG: &str = "cellkit:team";

/// In-memory fake of the cloud control plane
pub struct InMemoryCloudProvider {
    roles: DashMap<String, ResourceRef>,
    buckets: DashMap<String, ResourceRef>,
    lock_tables: DashMap<String, ResourceRef>,
    services: DashMap<String, (DeploymentDescriptor, String)>,
    stacks: DashMap<String, Vec<ResourceRef>>,
    state_docs: DashMap<(TeamId, Environment), serde_json::Value>,
    budgets: DashMap<TeamId, BudgetAlerts>,
    logs: DashMap<String, Vec<String>>,
    healthy: DashMap<String, bool>,

    /// Operations currently failing, by operation name
    failures: DashMap<String, String>,

    /// Operations that never complete, for call-timeout tests
    stalls: DashMap<String, ()>,

    /// Create-call counts per resource name, for idempotency assertions
    create_calls: DashMap<String, u32>,

    /// Extra tags applied to subsequently created resources
    extra_tags: DashMap<String, String>,

    probe_count: AtomicU32,
}

impl InMemoryCloudProvider {
    pub fn new() -> Self {
        Self {
            roles: DashMap::new(),
            buckets: DashMap::new(),
            lock_tables: DashMap::new(),
            services: DashMap::new(),
            stacks: DashMap::new(),
            state_docs: DashMap::new(),
            budgets: DashMap::new(),
            logs: DashMap::new(),
            healthy: DashMap::new(),
            failures: DashMap::new(),
            stalls: DashMap::new(),
            create_calls: DashMap::new(),
            extra_tags: DashMap::new(),
            probe_count: AtomicU32::new(0),
        }
    }

    /// Make every call of the named operation fail until cleared.
    pub fn fail_on(&self, operation: &str, reason: &str) {
        self.failures.insert(operation.to_string(), reason.to_string());
    }

    pub fn clear_failure(&self, operation: &str) {
        self.failures.remove(operation);
    }

    /// Make every call of the named operation hang forever.
    pub fn stall_on(&self, operation: &str) {
        self.stalls.insert(operation.to_string(), ());
    }

    /// Mark a service's health endpoint as responding healthy.
    pub fn set_service_healthy(&self, service: &str, healthy: bool) {
        self.healthy.insert(service.to_string(), healthy);
    }

    /// Seed log lines for a service.
    pub fn push_log(&self, service: &str, line: &str) {
        self.logs
            .entry(service.to_string())
            .or_default()
            .push(line.to_string());
    }

    /// Tag every subsequently created resource; used to simulate
    /// protected resources in guard tests.
    pub fn tag_new_resources(&self, key: &str, value: &str) {
        self.extra_tags.insert(key.to_string(), value.to_string());
    }

    /// How many times a create call was issued for a resource name.
    pub fn create_calls_for(&self, name: &str) -> u32 {
        self.create_calls.get(name).map(|c| *c).unwrap_or(0)
    }

    /// How many health probes were issued.
    pub fn probe_calls(&self) -> u32 {
        self.probe_count.load(Ordering::SeqCst)
    }

    pub fn configured_budget(&self, team: &TeamId) -> Option<BudgetAlerts> {
        self.budgets.get(team).map(|b| b.clone())
    }

    /// Entry check for every operation: hang if stalled, fail if injected.
    async fn gate(&self, operation: &str) -> Result<()> {
        if self.stalls.contains_key(operation) {
            std::future::pending::<()>().await;
        }
        if let Some(reason) = self.failures.get(operation) {
            return Err(ProviderError::call_failed(operation, reason.clone()));
        }
        Ok(())
    }

    /// Dump the current resources for persistence.
    pub fn snapshot(&self) -> ProviderState {
        fn dump<V: Clone>(map: &DashMap<String, V>) -> BTreeMap<String, V> {
            map.iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect()
        }
        ProviderState {
            roles: dump(&self.roles),
            buckets: dump(&self.buckets),
            lock_tables: dump(&self.lock_tables),
            services: dump(&self.services),
            stacks: dump(&self.stacks),
            state_docs: self
                .state_docs
                .iter()
                .map(|e| (e.key().0.clone(), e.key().1, e.value().clone()))
                .collect(),
            budgets: self
                .budgets
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
            healthy: dump(&self.healthy),
        }
    }

    /// Load previously dumped resources.
    pub fn restore(&self, state: ProviderState) {
        for (k, v) in state.roles {
            self.roles.insert(k, v);
        }
        for (k, v) in state.buckets {
            self.buckets.insert(k, v);
        }
        for (k, v) in state.lock_tables {
            self.lock_tables.insert(k, v);
        }
        for (k, v) in state.services {
            self.services.insert(k, v);
        }
        for (k, v) in state.stacks {
            self.stacks.insert(k, v);
        }
        for (team, environment, doc) in state.state_docs {
            self.state_docs.insert((team, environment), doc);
        }
        for (k, v) in state.budgets {
            self.budgets.insert(k, v);
        }
        for (k, v) in state.healthy {
            self.healthy.insert(k, v);
        }
    }

    fn record_create(&self, name: &str) {
        *self.create_calls.entry(name.to_string()).or_insert(0) += 1;
    }

    fn tags_for(&self, team: &TeamId) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::from([(TEAM_TAG.to_string(), team.to_string())]);
        for entry in self.extra_tags.iter() {
            tags.insert(entry.key().clone(), entry.value().clone());
        }
        tags
    }

    fn endpoint_for(service: &str) -> String {
        format!("https://{}.cells.example.com", service)
    }

    fn service_for_endpoint(endpoint: &str) -> Option<String> {
        endpoint
            .strip_prefix("https://")?
            .strip_suffix(".cells.example.com")
            .map(String::from)
    }
}

impl Default for InMemoryCloudProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CloudProvider for InMemoryCloudProvider {
    async fn create_role(&self, team: &TeamId, role: &str, boundary: &str) -> Result<()> {
        self.gate("create_role").await?;
        self.record_create(role);
        let mut resource = ResourceRef::new(ResourceKind::Role, role);
        resource.tags = self.tags_for(team);
        resource
            .tags
            .insert("cellkit:boundary".to_string(), boundary.to_string());
        self.roles.insert(role.to_string(), resource);
        Ok(())
    }

    async fn role_exists(&self, role: &str) -> Result<bool> {
        Ok(self.roles.contains_key(role))
    }

    async fn delete_role(&self, role: &str) -> Result<()> {
        self.gate("delete_role").await?;
        self.roles.remove(role);
        Ok(())
    }

    async fn create_state_bucket(&self, team: &TeamId, bucket: &str, role: &str) -> Result<()> {
        self.gate("create_state_bucket").await?;
        self.record_create(bucket);
        let mut resource = ResourceRef::new(ResourceKind::Bucket, bucket);
        resource.tags = self.tags_for(team);
        resource
            .tags
            .insert("cellkit:access-role".to_string(), role.to_string());
        self.buckets.insert(bucket.to_string(), resource);
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.buckets.contains_key(bucket))
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.gate("delete_bucket").await?;
        self.buckets.remove(bucket);
        Ok(())
    }

    async fn create_lock_table(&self, team: &TeamId, table: &str) -> Result<()> {
        self.gate("create_lock_table").await?;
        self.record_create(table);
        let mut resource = ResourceRef::new(ResourceKind::LockTable, table);
        resource.tags = self.tags_for(team);
        self.lock_tables.insert(table.to_string(), resource);
        Ok(())
    }

    async fn lock_table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.lock_tables.contains_key(table))
    }

    async fn delete_lock_table(&self, table: &str) -> Result<()> {
        self.gate("delete_lock_table").await?;
        self.lock_tables.remove(table);
        Ok(())
    }

    async fn write_state_doc(
        &self,
        team: &TeamId,
        environment: Environment,
        doc: serde_json::Value,
    ) -> Result<()> {
        self.gate("write_state_doc").await?;
        self.state_docs.insert((team.clone(), environment), doc);
        Ok(())
    }

    async fn read_state_doc(
        &self,
        team: &TeamId,
        environment: Environment,
    ) -> Result<Option<serde_json::Value>> {
        self.gate("read_state_doc").await?;
        Ok(self
            .state_docs
            .get(&(team.clone(), environment))
            .map(|d| d.clone()))
    }

    async fn apply_service(
        &self,
        service: &str,
        descriptor: &DeploymentDescriptor,
    ) -> Result<String> {
        self.gate("apply_service").await?;
        self.record_create(service);
        let endpoint = Self::endpoint_for(service);
        self.services
            .insert(service.to_string(), (descriptor.clone(), endpoint.clone()));
        self.healthy.entry(service.to_string()).or_insert(true);
        Ok(endpoint)
    }

    async fn describe_service(&self, service: &str) -> Result<ServiceStatus> {
        self.gate("describe_service").await?;
        let entry = self
            .services
            .get(service)
            .ok_or_else(|| ProviderError::NotFound(service.to_string()))?;
        let desired = entry.0.replicas;
        let healthy = self.healthy.get(service).map(|h| *h).unwrap_or(false);
        let running = if healthy { desired } else { 0 };
        Ok(ServiceStatus { running, desired })
    }

    async fn delete_service(&self, service: &str) -> Result<()> {
        self.gate("delete_service").await?;
        self.services.remove(service);
        self.healthy.remove(service);
        Ok(())
    }

    async fn target_health(&self, service: &str) -> Result<Vec<TargetHealth>> {
        self.gate("target_health").await?;
        let entry = self
            .services
            .get(service)
            .ok_or_else(|| ProviderError::NotFound(service.to_string()))?;
        let healthy = self.healthy.get(service).map(|h| *h).unwrap_or(false);
        Ok((0..entry.0.replicas)
            .map(|i| TargetHealth {
                target: format!("{}-{}", service, i),
                healthy,
            })
            .collect())
    }

    async fn probe_endpoint(&self, endpoint_url: &str) -> Result<bool> {
        self.gate("probe_endpoint").await?;
        self.probe_count.fetch_add(1, Ordering::SeqCst);
        let service = Self::service_for_endpoint(endpoint_url)
            .ok_or_else(|| ProviderError::NotFound(endpoint_url.to_string()))?;
        Ok(self.healthy.get(&service).map(|h| *h).unwrap_or(false))
    }

    async fn tail_logs(&self, service: &str, lines: usize) -> Result<Vec<String>> {
        self.gate("tail_logs").await?;
        let log = self.logs.get(service).map(|l| l.clone()).unwrap_or_default();
        let start = log.len().saturating_sub(lines);
        Ok(log[start..].to_vec())
    }

    async fn configure_budget_alerts(&self, team: &TeamId, alerts: &BudgetAlerts) -> Result<()> {
        self.gate("configure_budget_alerts").await?;
        self.budgets.insert(team.clone(), alerts.clone());
        Ok(())
    }

    async fn list_team_resources(&self, team: &TeamId) -> Result<Vec<ResourceRef>> {
        self.gate("list_team_resources").await?;
        let team_tag = team.to_string();
        let mut resources = Vec::new();
        for map in [&self.roles, &self.buckets, &self.lock_tables] {
            for entry in map.iter() {
                if entry.tags.get(TEAM_TAG) == Some(&team_tag) {
                    resources.push(entry.value().clone());
                }
            }
        }
        for entry in self.services.iter() {
            if &entry.0.team == team {
                let mut resource = ResourceRef::new(ResourceKind::Service, entry.key());
                resource.tags = self.tags_for(team);
                resources.push(resource);
            }
        }
        Ok(resources)
    }

    async fn apply_stack(
        &self,
        stack: &str,
        environment: Environment,
    ) -> Result<Vec<ResourceRef>> {
        self.gate("apply_stack").await?;
        self.record_create(stack);
        let resources = vec![
            ResourceRef::new(ResourceKind::Bucket, format!("{stack}-{environment}-data")),
            ResourceRef::new(ResourceKind::Other, format!("{stack}-{environment}-stack")),
        ];
        self.stacks.insert(stack.to_string(), resources.clone());
        Ok(resources)
    }

    async fn list_stack_resources(&self, stack: &str) -> Result<Vec<ResourceRef>> {
        self.gate("list_stack_resources").await?;
        let mut resources = Vec::new();
        if let Some(applied) = self.stacks.get(stack) {
            resources.extend(applied.iter().cloned());
        }
        for map in [&self.roles, &self.buckets, &self.lock_tables] {
            for entry in map.iter() {
                if entry.name.contains(stack) {
                    resources.push(entry.value().clone());
                }
            }
        }
        for entry in self.services.iter() {
            if entry.key().contains(stack) {
                resources.push(ResourceRef::new(ResourceKind::Service, entry.key()));
            }
        }
        Ok(resources)
    }

    async fn delete_resource(&self, resource: &ResourceRef) -> Result<()> {
        self.gate("delete_resource").await?;
        for mut entry in self.stacks.iter_mut() {
            entry.value_mut().retain(|r| r != resource);
        }
        match resource.kind {
            ResourceKind::Role => self.delete_role(&resource.name).await,
            ResourceKind::Bucket => self.delete_bucket(&resource.name).await,
            ResourceKind::LockTable => self.delete_lock_table(&resource.name).await,
            ResourceKind::Service => self.delete_service(&resource.name).await,
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cell_types::Tier;

    fn descriptor(team: &TeamId) -> DeploymentDescriptor {
        DeploymentDescriptor::for_tier(
            team.clone(),
            Environment::Dev,
            Tier::Small,
            "automation-server:stable",
            "acme/payments/credential-bundle",
        )
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let provider = InMemoryCloudProvider::new();
        let team = TeamId::new("payments").unwrap();

        provider.fail_on("create_role", "throttled");
        let err = provider
            .create_role(&team, "acme-payments-cell-role", "boundary")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::CallFailed { .. }));

        provider.clear_failure("create_role");
        provider
            .create_role(&team, "acme-payments-cell-role", "boundary")
            .await
            .unwrap();
        assert!(provider.role_exists("acme-payments-cell-role").await.unwrap());
    }

    #[tokio::test]
    async fn test_service_apply_and_probe() {
        let provider = InMemoryCloudProvider::new();
        let team = TeamId::new("payments").unwrap();

        let endpoint = provider
            .apply_service("acme-payments-dev-automation", &descriptor(&team))
            .await
            .unwrap();
        assert!(provider.probe_endpoint(&endpoint).await.unwrap());

        provider.set_service_healthy("acme-payments-dev-automation", false);
        assert!(!provider.probe_endpoint(&endpoint).await.unwrap());
    }

    #[tokio::test]
    async fn test_apply_stack_converges_and_teardown_empties_it() {
        let provider = InMemoryCloudProvider::new();

        let first = provider.apply_stack("shared-ci", Environment::Dev).await.unwrap();
        let second = provider.apply_stack("shared-ci", Environment::Dev).await.unwrap();
        assert_eq!(first, second);

        let listed = provider.list_stack_resources("shared-ci").await.unwrap();
        assert_eq!(listed.len(), 2);

        for resource in &listed {
            provider.delete_resource(resource).await.unwrap();
        }
        assert!(provider
            .list_stack_resources("shared-ci")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_restore_round_trips_resources() {
        let provider = InMemoryCloudProvider::new();
        let team = TeamId::new("payments").unwrap();
        provider
            .create_role(&team, "acme-payments-cell-role", "boundary")
            .await
            .unwrap();
        provider
            .write_state_doc(&team, Environment::Dev, serde_json::json!({"numeric_id": 1}))
            .await
            .unwrap();
        provider
            .apply_service("acme-payments-dev-automation", &descriptor(&team))
            .await
            .unwrap();

        let dumped = serde_json::to_string(&provider.snapshot()).unwrap();
        let restored = InMemoryCloudProvider::new();
        restored.restore(serde_json::from_str(&dumped).unwrap());

        assert!(restored.role_exists("acme-payments-cell-role").await.unwrap());
        assert_eq!(
            restored
                .read_state_doc(&team, Environment::Dev)
                .await
                .unwrap()
                .unwrap()["numeric_id"],
            1
        );
        assert!(restored
            .describe_service("acme-payments-dev-automation")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_list_team_resources() {
        let provider = InMemoryCloudProvider::new();
        let team = TeamId::new("payments").unwrap();
        let other = TeamId::new("data").unwrap();

        provider.create_role(&team, "r-payments", "b").await.unwrap();
        provider
            .create_lock_table(&team, "t-payments")
            .await
            .unwrap();
        provider.create_role(&other, "r-data", "b").await.unwrap();

        let resources = provider.list_team_resources(&team).await.unwrap();
        assert_eq!(resources.len(), 2);
        assert!(resources.iter().all(|r| r.tags[TEAM_TAG] == "payments"));
    }
}
