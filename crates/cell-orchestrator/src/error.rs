//! Orchestration error types

use cell_provider::ProviderError;
use cell_types::TeamId;
use thiserror::Error;

/// Deployment orchestration errors
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The provisioner has not published its outputs for this team yet
    #[error("No provisioner state document for team {team} in {environment}")]
    StateDocMissing {
        team: TeamId,
        environment: cell_types::Environment,
    },

    /// The state document exists but lacks a field the descriptor needs
    #[error("State document for team {team} is missing field {field:?}")]
    StateDocIncomplete { team: TeamId, field: &'static str },

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;
