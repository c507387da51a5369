//! Team registry trait

use crate::error::Result;
use async_trait::async_trait;
use cell_types::{Environment, Team, TeamId, TeamStatus};

/// Filter for registry scans
#[derive(Debug, Clone, Default)]
pub struct TeamFilter {
    /// Restrict to a specific status
    pub status: Option<TeamStatus>,

    /// Restrict to a specific environment
    pub environment: Option<Environment>,

    /// Include decommissioned teams (excluded by default)
    pub include_decommissioned: bool,
}

impl TeamFilter {
    /// All teams that still occupy a numeric-id slot.
    pub fn occupying_slots() -> Self {
        Self::default()
    }

    pub fn matches(&self, team: &Team) -> bool {
        if !self.include_decommissioned && team.status.is_decommissioned() {
            return false;
        }
        if let Some(status) = self.status {
            if team.status != status {
                return false;
            }
        }
        if let Some(environment) = self.environment {
            if team.environment != environment {
                return false;
            }
        }
        true
    }
}

/// Durable key/value store of team records
///
/// The registry enforces only primary-key uniqueness on the slug; all
/// numeric-id and CIDR uniqueness checks live in the allocator.
#[async_trait]
pub trait TeamRegistry: Send + Sync {
    /// Fetch a team by slug.
    async fn get(&self, id: &TeamId) -> Result<Option<Team>>;

    /// Create-only insert; fails with `AlreadyExists` if the slug is taken.
    async fn put(&self, team: Team) -> Result<()>;

    /// Apply a mutation to an existing record, touching `last_modified`.
    async fn update(
        &self,
        id: &TeamId,
        mutation: Box<dyn for<'a> FnOnce(&'a mut Team) + Send>,
    ) -> Result<Team>;

    /// Scan records matching the filter.
    async fn scan(&self, filter: &TeamFilter) -> Result<Vec<Team>>;

    /// Remove a record entirely. Decommissioned teams are normally kept
    /// as tombstones; deletion is for placeholder cleanup.
    async fn delete(&self, id: &TeamId) -> Result<()>;
}
