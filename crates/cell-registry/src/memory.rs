//! In-memory implementations of the registry traits
//!
//! These are suitable for development and testing. Production deployments
//! back the same traits with a cloud key-value table, using its
//! conditional-write primitive for `SlotClaims::claim`.

use crate::allocator::{MAX_NUMERIC_ID, MIN_NUMERIC_ID};
use crate::error::{RegistryError, Result};
use crate::slots::SlotClaims;
use crate::team::{TeamFilter, TeamRegistry};
use async_trait::async_trait;
use cell_types::{Team, TeamId};
use dashmap::DashMap;

/// In-memory team registry
pub struct InMemoryTeamRegistry {
    teams: DashMap<TeamId, Team>,
}

impl InMemoryTeamRegistry {
    pub fn new() -> Self {
        Self {
            teams: DashMap::new(),
        }
    }
}

impl Default for InMemoryTeamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TeamRegistry for InMemoryTeamRegistry {
    async fn get(&self, id: &TeamId) -> Result<Option<Team>> {
        Ok(self.teams.get(id).map(|t| t.clone()))
    }

    async fn put(&self, team: Team) -> Result<()> {
        match self.teams.entry(team.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(RegistryError::AlreadyExists(team.id))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(team);
                Ok(())
            }
        }
    }

    async fn update(
        &self,
        id: &TeamId,
        mutation: Box<dyn for<'a> FnOnce(&'a mut Team) + Send>,
    ) -> Result<Team> {
        let mut entry = self
            .teams
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.clone()))?;
        mutation(entry.value_mut());
        entry.touch();
        Ok(entry.clone())
    }

    async fn scan(&self, filter: &TeamFilter) -> Result<Vec<Team>> {
        Ok(self
            .teams
            .iter()
            .filter(|t| filter.matches(t.value()))
            .map(|t| t.value().clone())
            .collect())
    }

    async fn delete(&self, id: &TeamId) -> Result<()> {
        self.teams.remove(id);
        Ok(())
    }
}

/// In-memory slot claim table
///
/// `claim` goes through the DashMap entry API, which holds the shard lock
/// for the whole occupied-check-and-insert, giving the conditional-create
/// semantics the allocator relies on.
pub struct InMemorySlotClaims {
    slots: DashMap<u8, TeamId>,
}

impl InMemorySlotClaims {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }
}

impl Default for InMemorySlotClaims {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SlotClaims for InMemorySlotClaims {
    async fn claim(&self, numeric_id: u8, team: &TeamId) -> Result<()> {
        if !(MIN_NUMERIC_ID..=MAX_NUMERIC_ID).contains(&numeric_id) {
            return Err(RegistryError::SlotOutOfRange(numeric_id));
        }
        match self.slots.entry(numeric_id) {
            dashmap::mapref::entry::Entry::Occupied(held) => Err(RegistryError::SlotConflict {
                id: numeric_id,
                holder: held.get().clone(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(team.clone());
                Ok(())
            }
        }
    }

    async fn release(&self, numeric_id: u8) -> Result<()> {
        self.slots.remove(&numeric_id);
        Ok(())
    }

    async fn holder(&self, numeric_id: u8) -> Result<Option<TeamId>> {
        Ok(self.slots.get(&numeric_id).map(|t| t.clone()))
    }

    async fn occupied(&self) -> Result<Vec<u8>> {
        let mut ids: Vec<u8> = self.slots.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cell_types::{Environment, Tier, TeamStatus};
    use std::collections::BTreeSet;

    fn team(slug: &str, numeric_id: u8) -> Team {
        Team {
            id: TeamId::new(slug).unwrap(),
            numeric_id,
            status: TeamStatus::Active,
            org: "acme".into(),
            cost_center: "cc-100".into(),
            budget_monthly: None,
            environment: Environment::Dev,
            region: "us-east-1".into(),
            leads: BTreeSet::new(),
            network_range: crate::allocator::network_range_for(numeric_id),
            tier: Tier::Small,
            created_at: chrono::Utc::now(),
            last_modified: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_put_is_create_only() {
        let registry = InMemoryTeamRegistry::new();
        registry.put(team("payments", 1)).await.unwrap();

        let err = registry.put(team("payments", 2)).await.unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_scan_excludes_decommissioned_by_default() {
        let registry = InMemoryTeamRegistry::new();
        registry.put(team("alive", 1)).await.unwrap();

        let mut dead = team("dead", 2);
        dead.status = TeamStatus::Decommissioned;
        registry.put(dead).await.unwrap();

        let scanned = registry.scan(&TeamFilter::occupying_slots()).await.unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].id.as_str(), "alive");
    }

    #[tokio::test]
    async fn test_update_touches_last_modified() {
        let registry = InMemoryTeamRegistry::new();
        registry.put(team("payments", 1)).await.unwrap();
        let before = registry
            .get(&TeamId::new("payments").unwrap())
            .await
            .unwrap()
            .unwrap()
            .last_modified;

        let updated = registry
            .update(
                &TeamId::new("payments").unwrap(),
                Box::new(|t| t.tier = Tier::Large),
            )
            .await
            .unwrap();

        assert_eq!(updated.tier, Tier::Large);
        assert!(updated.last_modified >= before);
    }

    #[tokio::test]
    async fn test_claim_conflict_names_holder() {
        let claims = InMemorySlotClaims::new();
        let a = TeamId::new("team-a").unwrap();
        let b = TeamId::new("team-b").unwrap();

        claims.claim(7, &a).await.unwrap();
        let err = claims.claim(7, &b).await.unwrap_err();
        match err {
            RegistryError::SlotConflict { id, holder } => {
                assert_eq!(id, 7);
                assert_eq!(holder, a);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_claim_rejects_out_of_range() {
        let claims = InMemorySlotClaims::new();
        let a = TeamId::new("team-a").unwrap();
        assert!(matches!(
            claims.claim(0, &a).await.unwrap_err(),
            RegistryError::SlotOutOfRange(0)
        ));
        assert!(matches!(
            claims.claim(255, &a).await.unwrap_err(),
            RegistryError::SlotOutOfRange(255)
        ));
    }
}
