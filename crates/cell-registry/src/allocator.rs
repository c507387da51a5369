//! ID/CIDR allocator
//!
//! Assigns each new team the smallest unused integer in [1, 254] and the
//! derived network range `10.{n}.0.0/16`. The derivation is injective, so
//! numeric-id uniqueness implies pairwise-disjoint network ranges.
//!
//! A plain scan-then-pick is racy: two concurrent onboardings can observe
//! the same smallest free id. The allocator therefore treats the scan only
//! as a hint and claims the candidate through the conditional slot table,
//! retrying the next candidate on conflict.

use crate::error::{RegistryError, Result};
use crate::slots::SlotClaims;
use crate::team::{TeamFilter, TeamRegistry};
use cell_types::TeamId;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Smallest allocatable numeric id
pub const MIN_NUMERIC_ID: u8 = 1;

/// Largest allocatable numeric id
pub const MAX_NUMERIC_ID: u8 = 254;

/// Derive the network range for a numeric id.
pub fn network_range_for(numeric_id: u8) -> String {
    format!("10.{}.0.0/16", numeric_id)
}

/// Allocates unique numeric identities backed by the claim table
pub struct IdAllocator {
    registry: Arc<dyn TeamRegistry>,
    claims: Arc<dyn SlotClaims>,
}

impl IdAllocator {
    pub fn new(registry: Arc<dyn TeamRegistry>, claims: Arc<dyn SlotClaims>) -> Self {
        Self { registry, claims }
    }

    /// Claim the smallest free numeric id for a team.
    ///
    /// Returns the claimed id; the caller derives the network range with
    /// [`network_range_for`]. Fails with `AllocationExhausted` when all
    /// 254 slots are occupied, without mutating anything.
    #[instrument(skip(self), fields(team = %team))]
    pub async fn allocate(&self, team: &TeamId) -> Result<u8> {
        // The scan seeds the candidate order; the claim is what decides.
        let mut taken: BTreeSet<u8> = self
            .claims
            .occupied()
            .await?
            .into_iter()
            .collect();
        for record in self.registry.scan(&TeamFilter::occupying_slots()).await? {
            taken.insert(record.numeric_id);
        }

        for candidate in MIN_NUMERIC_ID..=MAX_NUMERIC_ID {
            if taken.contains(&candidate) {
                continue;
            }
            match self.claims.claim(candidate, team).await {
                Ok(()) => {
                    debug!(numeric_id = candidate, "Claimed numeric id");
                    return Ok(candidate);
                }
                // Lost the race for this slot; move on to the next one.
                Err(RegistryError::SlotConflict { .. }) => continue,
                Err(other) => return Err(other),
            }
        }

        Err(RegistryError::AllocationExhausted)
    }

    /// Release a slot when its team is decommissioned.
    pub async fn release(&self, numeric_id: u8) -> Result<()> {
        self.claims.release(numeric_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemorySlotClaims, InMemoryTeamRegistry};

    fn allocator() -> (IdAllocator, Arc<InMemorySlotClaims>) {
        let registry = Arc::new(InMemoryTeamRegistry::new());
        let claims = Arc::new(InMemorySlotClaims::new());
        (IdAllocator::new(registry, claims.clone()), claims)
    }

    #[tokio::test]
    async fn test_sequential_allocations_are_distinct_and_smallest() {
        let (alloc, _) = allocator();

        for expected in 1..=20u8 {
            let team = TeamId::new(format!("team-{}", expected)).unwrap();
            let id = alloc.allocate(&team).await.unwrap();
            assert_eq!(id, expected);
        }
    }

    #[tokio::test]
    async fn test_network_ranges_disjoint() {
        let (alloc, _) = allocator();
        let mut ranges = BTreeSet::new();

        for n in 1..=50u8 {
            let team = TeamId::new(format!("team-{}", n)).unwrap();
            let id = alloc.allocate(&team).await.unwrap();
            assert!(ranges.insert(network_range_for(id)), "duplicate range");
        }
    }

    #[tokio::test]
    async fn test_released_slot_is_reused() {
        let (alloc, _) = allocator();

        let a = TeamId::new("team-a").unwrap();
        let b = TeamId::new("team-b").unwrap();
        let c = TeamId::new("team-c").unwrap();

        assert_eq!(alloc.allocate(&a).await.unwrap(), 1);
        assert_eq!(alloc.allocate(&b).await.unwrap(), 2);

        alloc.release(1).await.unwrap();
        assert_eq!(alloc.allocate(&c).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_fails_without_mutation() {
        let (alloc, claims) = allocator();

        for n in 1..=254u16 {
            let team = TeamId::new(format!("team-{}", n)).unwrap();
            alloc.allocate(&team).await.unwrap();
        }

        let overflow = TeamId::new("team-overflow").unwrap();
        let err = alloc.allocate(&overflow).await.unwrap_err();
        assert!(matches!(err, RegistryError::AllocationExhausted));
        assert_eq!(claims.occupied().await.unwrap().len(), 254);
    }

    #[tokio::test]
    async fn test_concurrent_allocation_never_collides() {
        let registry = Arc::new(InMemoryTeamRegistry::new());
        let claims = Arc::new(InMemorySlotClaims::new());
        let alloc = Arc::new(IdAllocator::new(registry, claims));

        let mut handles = Vec::new();
        for n in 0..32 {
            let alloc = alloc.clone();
            handles.push(tokio::spawn(async move {
                let team = TeamId::new(format!("team-{}", n)).unwrap();
                alloc.allocate(&team).await.unwrap()
            }));
        }

        let mut ids = BTreeSet::new();
        for handle in handles {
            let id = handle.await.unwrap();
            assert!(ids.insert(id), "numeric id {} allocated twice", id);
        }
        assert_eq!(ids.len(), 32);
    }
}
