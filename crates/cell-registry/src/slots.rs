//! Numeric-id claim table
//!
//! A fixed slot table over [1, 254]. `claim` is a conditional create:
//! it succeeds only if the slot is absent, which is what makes concurrent
//! allocation safe. Production backends map this onto a conditional-write
//! primitive of the key-value store; the in-memory implementation uses a
//! single-writer map entry.

use crate::error::Result;
use async_trait::async_trait;
use cell_types::TeamId;

/// Conditional claims on numeric-id slots
#[async_trait]
pub trait SlotClaims: Send + Sync {
    /// Atomically claim a slot for a team. Fails with `SlotConflict` if
    /// the slot is already held, `SlotOutOfRange` if outside [1, 254].
    async fn claim(&self, numeric_id: u8, team: &TeamId) -> Result<()>;

    /// Release a slot on decommission. Releasing a free slot is a no-op.
    async fn release(&self, numeric_id: u8) -> Result<()>;

    /// Current holder of a slot, if any.
    async fn holder(&self, numeric_id: u8) -> Result<Option<TeamId>>;

    /// All currently occupied slot ids.
    async fn occupied(&self) -> Result<Vec<u8>>;
}
