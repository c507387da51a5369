//! Credential Bundle Manager
//!
//! Owns all mutations of per-team secret material. `merge` overlays only
//! the provided keys and writes the full bundle back atomically;
//! `rotate_all` additionally regenerates self-owned secrets with a
//! cryptographically strong generator. After every successful write the
//! manager broadcasts a change signal so dependent deployments reload.

use crate::error::{Result, SecretsError};
use crate::store::BundleStore;
use cell_types::{bundle::WEBHOOK_SECRET_KEY, CredentialBundle, TeamId};
use rand::distributions::Alphanumeric;
use rand::{rngs::OsRng, Rng};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, instrument};

/// Length of generated self-owned secrets
const GENERATED_SECRET_LEN: usize = 48;

/// Notification that a team's bundle changed
#[derive(Debug, Clone)]
pub struct BundleChanged {
    pub team: TeamId,
    pub version: u64,
    /// Names of the keys that changed; values are never carried
    pub keys: Vec<String>,
}

/// Manager for per-team credential bundles
pub struct CredentialBundleManager {
    store: Arc<dyn BundleStore>,
    change_tx: broadcast::Sender<BundleChanged>,
}

impl CredentialBundleManager {
    pub fn new(store: Arc<dyn BundleStore>) -> Self {
        let (change_tx, _) = broadcast::channel(256);
        Self { store, change_tx }
    }

    /// Subscribe to bundle-change signals.
    pub fn subscribe(&self) -> broadcast::Receiver<BundleChanged> {
        self.change_tx.subscribe()
    }

    /// Fetch a team's bundle.
    pub async fn get(&self, team: &TeamId) -> Result<CredentialBundle> {
        self.store
            .load(team)
            .await?
            .ok_or_else(|| SecretsError::BundleNotFound(team.clone()))
    }

    /// Create the initial bundle for a newly provisioned team.
    ///
    /// Seeds the self-owned webhook secret so the automation server can
    /// verify inbound webhooks from its first boot.
    #[instrument(skip(self, initial), fields(team = %team))]
    pub async fn initialize(
        &self,
        team: &TeamId,
        initial: BTreeMap<String, String>,
    ) -> Result<CredentialBundle> {
        let mut secrets = initial;
        secrets
            .entry(WEBHOOK_SECRET_KEY.to_string())
            .or_insert_with(generate_secret);

        let bundle = CredentialBundle {
            version: 1,
            secrets,
        };
        self.store.store(team, bundle.clone(), None).await?;

        info!(team = %team, keys = bundle.secrets.len(), "Credential bundle initialized");
        self.signal(team, &bundle, bundle.keys().map(String::from).collect());
        Ok(bundle)
    }

    /// Overlay only the provided keys, bump the version exactly once, and
    /// write the whole bundle back.
    #[instrument(skip(self, updates), fields(team = %team))]
    pub async fn merge(
        &self,
        team: &TeamId,
        updates: BTreeMap<String, String>,
    ) -> Result<CredentialBundle> {
        let current = self.get(team).await?;
        let changed_keys: Vec<String> = updates.keys().cloned().collect();

        let merged = current.merged(updates);
        self.store
            .store(team, merged.clone(), Some(current.version))
            .await?;

        info!(
            team = %team,
            version = merged.version,
            keys = ?changed_keys,
            "Credential bundle merged"
        );
        self.signal(team, &merged, changed_keys);
        Ok(merged)
    }

    /// Regenerate every self-owned secret and overlay any caller updates
    /// in the same single version bump.
    #[instrument(skip(self, updates), fields(team = %team))]
    pub async fn rotate_all(
        &self,
        team: &TeamId,
        updates: BTreeMap<String, String>,
    ) -> Result<CredentialBundle> {
        let mut updates = updates;
        updates.insert(WEBHOOK_SECRET_KEY.to_string(), generate_secret());
        self.merge(team, updates).await
    }

    /// Remove a team's bundle on decommission.
    pub async fn delete(&self, team: &TeamId) -> Result<()> {
        self.store.delete(team).await
    }

    fn signal(&self, team: &TeamId, bundle: &CredentialBundle, keys: Vec<String>) {
        let _ = self.change_tx.send(BundleChanged {
            team: team.clone(),
            version: bundle.version,
            keys,
        });
    }
}

/// Generate a secret with the OS CSPRNG.
fn generate_secret() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(GENERATED_SECRET_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryBundleStore;

    fn manager() -> CredentialBundleManager {
        CredentialBundleManager::new(Arc::new(InMemoryBundleStore::new()))
    }

    fn team() -> TeamId {
        TeamId::new("payments").unwrap()
    }

    #[tokio::test]
    async fn test_initialize_seeds_webhook_secret() {
        let mgr = manager();
        let bundle = mgr
            .initialize(&team(), BTreeMap::from([("github_token".into(), "ghp_x".into())]))
            .await
            .unwrap();

        assert_eq!(bundle.version, 1);
        assert!(bundle.get(WEBHOOK_SECRET_KEY).is_some());
        assert_eq!(bundle.get("github_token"), Some("ghp_x"));
    }

    #[tokio::test]
    async fn test_merge_changes_only_given_keys_and_bumps_once() {
        let mgr = manager();
        mgr.initialize(&team(), BTreeMap::from([("github_token".into(), "ghp_x".into())]))
            .await
            .unwrap();
        let before = mgr.get(&team()).await.unwrap();

        let merged = mgr
            .merge(
                &team(),
                BTreeMap::from([("slack_webhook_url".into(), "https://x".into())]),
            )
            .await
            .unwrap();

        assert_eq!(merged.version, before.version + 1);
        assert_eq!(merged.get("slack_webhook_url"), Some("https://x"));
        assert_eq!(merged.get("github_token"), before.get("github_token"));
        assert_eq!(
            merged.get(WEBHOOK_SECRET_KEY),
            before.get(WEBHOOK_SECRET_KEY)
        );
    }

    #[tokio::test]
    async fn test_rotate_all_regenerates_self_owned_secret() {
        let mgr = manager();
        mgr.initialize(&team(), BTreeMap::new()).await.unwrap();
        let before = mgr.get(&team()).await.unwrap();

        let rotated = mgr.rotate_all(&team(), BTreeMap::new()).await.unwrap();

        assert_eq!(rotated.version, before.version + 1);
        assert_ne!(
            rotated.get(WEBHOOK_SECRET_KEY),
            before.get(WEBHOOK_SECRET_KEY)
        );
        assert_eq!(
            rotated.get(WEBHOOK_SECRET_KEY).unwrap().len(),
            GENERATED_SECRET_LEN
        );
    }

    #[tokio::test]
    async fn test_merge_signals_dependents() {
        let mgr = manager();
        mgr.initialize(&team(), BTreeMap::new()).await.unwrap();
        let mut rx = mgr.subscribe();

        mgr.merge(&team(), BTreeMap::from([("cost_api_key".into(), "ck".into())]))
            .await
            .unwrap();

        let changed = rx.recv().await.unwrap();
        assert_eq!(changed.team, team());
        assert_eq!(changed.keys, vec!["cost_api_key".to_string()]);
    }

    #[tokio::test]
    async fn test_get_missing_bundle() {
        let mgr = manager();
        assert!(matches!(
            mgr.get(&team()).await.unwrap_err(),
            SecretsError::BundleNotFound(_)
        ));
    }
}
