//! Lifecycle error types

use cell_guard::GuardError;
use cell_orchestrator::OrchestratorError;
use cell_provider::ProviderError;
use cell_provision::ProvisionError;
use cell_registry::RegistryError;
use cell_secrets::SecretsError;
use cell_types::{TeamId, TeamStatus};
use thiserror::Error;

/// Errors surfaced by the lifecycle operator
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Team not found: {0}")]
    NotFound(TeamId),

    /// The team exists but its status does not admit this operation
    #[error("Team {team} is {status}")]
    InvalidStatus { team: TeamId, status: TeamStatus },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error(transparent)]
    Secrets(#[from] SecretsError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
