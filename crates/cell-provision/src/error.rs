//! Provisioning error types

use crate::provisioner::ProvisionStep;
use cell_provider::ProviderError;
use cell_registry::RegistryError;
use cell_types::TeamId;
use thiserror::Error;

/// Provisioning errors
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Re-onboarding a fully provisioned team without explicit intent
    #[error("Team already exists: {0}")]
    AlreadyExists(TeamId),

    /// A step failed; prior steps are left in place for resumption
    #[error("Provisioning step {step} failed on {resource}: {source}")]
    StepFailed {
        step: ProvisionStep,
        resource: String,
        #[source]
        source: ProviderError,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;
