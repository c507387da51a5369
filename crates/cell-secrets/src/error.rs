//! Secrets error types

use cell_types::TeamId;
use thiserror::Error;

/// Secrets errors
#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("No credential bundle for team: {0}")]
    BundleNotFound(TeamId),

    #[error("Bundle version conflict for {team}: stored {stored}, expected {expected}")]
    VersionConflict {
        team: TeamId,
        stored: u64,
        expected: u64,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for secrets operations
pub type Result<T> = std::result::Result<T, SecretsError>;
