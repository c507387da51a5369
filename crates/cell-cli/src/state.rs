//! File-backed state for the CLI
//!
//! One JSON document holds the team registry, the slot claim table, the
//! credential bundles, and a dump of the local provider's resources, so
//! `cellctl` invocations compose: onboard, then deploy, then diagnose,
//! each in its own process. The whole document is rewritten on every
//! mutation; at the CLI's scale (at most 254 teams) that is cheap and
//! keeps the file human-inspectable.

use async_trait::async_trait;
use cell_provider::{InMemoryCloudProvider, ProviderState};
use cell_registry::{
    RegistryError, SlotClaims, TeamFilter, TeamRegistry, MAX_NUMERIC_ID, MIN_NUMERIC_ID,
};
use cell_secrets::{BundleStore, SecretsError};
use cell_types::{CredentialBundle, Team, TeamId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Everything the CLI persists between invocations
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDoc {
    teams: BTreeMap<TeamId, Team>,
    slots: BTreeMap<u8, TeamId>,
    bundles: BTreeMap<TeamId, CredentialBundle>,
    #[serde(default)]
    provider: ProviderState,
}

/// JSON-file implementation of the registry, claim, and bundle traits
pub struct FileStore {
    path: PathBuf,
    doc: Mutex<StateDoc>,
}

impl FileStore {
    /// Open the state file, creating an empty document if it does not
    /// exist yet. The file itself is only written on the first mutation.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Arc<Self>> {
        let path = path.as_ref().to_path_buf();
        let doc = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            StateDoc::default()
        };
        Ok(Arc::new(Self {
            path,
            doc: Mutex::new(doc),
        }))
    }

    /// Hand the persisted provider resources to a freshly built provider.
    pub async fn hydrate_provider(&self, provider: &InMemoryCloudProvider) {
        let mut doc = self.doc.lock().await;
        provider.restore(std::mem::take(&mut doc.provider));
    }

    /// Persist the provider's resources alongside the registry state.
    pub async fn save_provider(&self, state: ProviderState) -> anyhow::Result<()> {
        let mut doc = self.doc.lock().await;
        doc.provider = state;
        self.persist(&doc)?;
        Ok(())
    }

    fn persist(&self, doc: &StateDoc) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(doc)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(&self.path, raw)
    }
}

#[async_trait]
impl TeamRegistry for FileStore {
    async fn get(&self, id: &TeamId) -> cell_registry::Result<Option<Team>> {
        let doc = self.doc.lock().await;
        Ok(doc.teams.get(id).cloned())
    }

    async fn put(&self, team: Team) -> cell_registry::Result<()> {
        let mut doc = self.doc.lock().await;
        if doc.teams.contains_key(&team.id) {
            return Err(RegistryError::AlreadyExists(team.id));
        }
        doc.teams.insert(team.id.clone(), team);
        self.persist(&doc)
            .map_err(|e| RegistryError::Storage(e.to_string()))
    }

    async fn update(
        &self,
        id: &TeamId,
        mutation: Box<dyn for<'a> FnOnce(&'a mut Team) + Send>,
    ) -> cell_registry::Result<Team> {
        let mut doc = self.doc.lock().await;
        let team = doc
            .teams
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        mutation(team);
        team.touch();
        let team = team.clone();
        self.persist(&doc)
            .map_err(|e| RegistryError::Storage(e.to_string()))?;
        Ok(team)
    }

    async fn scan(&self, filter: &TeamFilter) -> cell_registry::Result<Vec<Team>> {
        let doc = self.doc.lock().await;
        Ok(doc
            .teams
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &TeamId) -> cell_registry::Result<()> {
        let mut doc = self.doc.lock().await;
        doc.teams.remove(id);
        self.persist(&doc)
            .map_err(|e| RegistryError::Storage(e.to_string()))
    }
}

#[async_trait]
impl SlotClaims for FileStore {
    async fn claim(&self, numeric_id: u8, team: &TeamId) -> cell_registry::Result<()> {
        if !(MIN_NUMERIC_ID..=MAX_NUMERIC_ID).contains(&numeric_id) {
            return Err(RegistryError::SlotOutOfRange(numeric_id));
        }
        let mut doc = self.doc.lock().await;
        if let Some(holder) = doc.slots.get(&numeric_id) {
            return Err(RegistryError::SlotConflict {
                id: numeric_id,
                holder: holder.clone(),
            });
        }
        doc.slots.insert(numeric_id, team.clone());
        self.persist(&doc)
            .map_err(|e| RegistryError::Storage(e.to_string()))
    }

    async fn release(&self, numeric_id: u8) -> cell_registry::Result<()> {
        let mut doc = self.doc.lock().await;
        doc.slots.remove(&numeric_id);
        self.persist(&doc)
            .map_err(|e| RegistryError::Storage(e.to_string()))
    }

    async fn holder(&self, numeric_id: u8) -> cell_registry::Result<Option<TeamId>> {
        let doc = self.doc.lock().await;
        Ok(doc.slots.get(&numeric_id).cloned())
    }

    async fn occupied(&self) -> cell_registry::Result<Vec<u8>> {
        let doc = self.doc.lock().await;
        Ok(doc.slots.keys().copied().collect())
    }
}

#[async_trait]
impl BundleStore for FileStore {
    async fn load(&self, team: &TeamId) -> cell_secrets::Result<Option<CredentialBundle>> {
        let doc = self.doc.lock().await;
        Ok(doc.bundles.get(team).cloned())
    }

    async fn store(
        &self,
        team: &TeamId,
        bundle: CredentialBundle,
        expected_version: Option<u64>,
    ) -> cell_secrets::Result<()> {
        let mut doc = self.doc.lock().await;
        match doc.bundles.get(team) {
            Some(held) => {
                let stored = held.version;
                match expected_version {
                    Some(expected) if expected == stored => {}
                    other => {
                        return Err(SecretsError::VersionConflict {
                            team: team.clone(),
                            stored,
                            expected: other.unwrap_or(0),
                        })
                    }
                }
            }
            None => {
                if expected_version.is_some() {
                    return Err(SecretsError::BundleNotFound(team.clone()));
                }
            }
        }
        doc.bundles.insert(team.clone(), bundle);
        self.persist(&doc)
            .map_err(|e| SecretsError::Storage(e.to_string()))
    }

    async fn delete(&self, team: &TeamId) -> cell_secrets::Result<()> {
        let mut doc = self.doc.lock().await;
        doc.bundles.remove(team);
        self.persist(&doc)
            .map_err(|e| SecretsError::Storage(e.to_string()))
    }
}
