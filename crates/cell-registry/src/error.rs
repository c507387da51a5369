//! Registry error types

use cell_types::TeamId;
use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Team not found: {0}")]
    NotFound(TeamId),

    #[error("Team already exists: {0}")]
    AlreadyExists(TeamId),

    #[error("Numeric id {id} already claimed by {holder}")]
    SlotConflict { id: u8, holder: TeamId },

    #[error("Numeric id pool exhausted: all 254 slots occupied")]
    AllocationExhausted,

    #[error("Numeric id {0} out of range [1, 254]")]
    SlotOutOfRange(u8),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
