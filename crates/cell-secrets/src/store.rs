//! Bundle storage trait and in-memory implementation
//!
//! The store deals only in whole bundles. `store` takes the expected
//! current version so a concurrent writer is detected as a version
//! conflict instead of a silent overwrite.

use crate::error::{Result, SecretsError};
use async_trait::async_trait;
use cell_types::{CredentialBundle, TeamId};
use dashmap::DashMap;

/// Whole-bundle storage per team
#[async_trait]
pub trait BundleStore: Send + Sync {
    /// Load the current bundle, if one exists.
    async fn load(&self, team: &TeamId) -> Result<Option<CredentialBundle>>;

    /// Store a full bundle. `expected_version` is the version the caller
    /// read before modifying; a mismatch fails with `VersionConflict`.
    /// Pass `None` when creating the first bundle.
    async fn store(
        &self,
        team: &TeamId,
        bundle: CredentialBundle,
        expected_version: Option<u64>,
    ) -> Result<()>;

    /// Delete a team's bundle on decommission.
    async fn delete(&self, team: &TeamId) -> Result<()>;
}

/// In-memory bundle store for development and tests
pub struct InMemoryBundleStore {
    bundles: DashMap<TeamId, CredentialBundle>,
}

impl InMemoryBundleStore {
    pub fn new() -> Self {
        Self {
            bundles: DashMap::new(),
        }
    }
}

impl Default for InMemoryBundleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BundleStore for InMemoryBundleStore {
    async fn load(&self, team: &TeamId) -> Result<Option<CredentialBundle>> {
        Ok(self.bundles.get(team).map(|b| b.clone()))
    }

    async fn store(
        &self,
        team: &TeamId,
        bundle: CredentialBundle,
        expected_version: Option<u64>,
    ) -> Result<()> {
        match self.bundles.entry(team.clone()) {
            dashmap::mapref::entry::Entry::Occupied(mut held) => {
                let stored = held.get().version;
                match expected_version {
                    Some(expected) if expected == stored => {
                        held.insert(bundle);
                        Ok(())
                    }
                    other => Err(SecretsError::VersionConflict {
                        team: team.clone(),
                        stored,
                        expected: other.unwrap_or(0),
                    }),
                }
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                if expected_version.is_some() {
                    return Err(SecretsError::BundleNotFound(team.clone()));
                }
                slot.insert(bundle);
                Ok(())
            }
        }
    }

    async fn delete(&self, team: &TeamId) -> Result<()> {
        self.bundles.remove(team);
        Ok(())
    }
}
