//! Cell Registry - durable team records and identity allocation
//!
//! The registry is the single source of truth for team identity and
//! status. It enforces only primary-key uniqueness on the team slug;
//! numeric-id uniqueness is the allocator's job, backed by a conditional
//! claim table so concurrent onboarding cannot race on the same slot.

#![deny(unsafe_code)]

pub mod allocator;
pub mod error;
pub mod memory;
pub mod slots;
pub mod team;

pub use allocator::{network_range_for, IdAllocator, MAX_NUMERIC_ID, MIN_NUMERIC_ID};
pub use error::{RegistryError, Result};
pub use memory::{InMemorySlotClaims, InMemoryTeamRegistry};
pub use slots::SlotClaims;
pub use team::{TeamFilter, TeamRegistry};
