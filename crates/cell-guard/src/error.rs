//! Guard error types

use cell_provider::ProviderError;
use thiserror::Error;

/// Safety-guard errors
#[derive(Debug, Error)]
pub enum GuardError {
    /// A candidate resource matched a protected pattern and `force` was
    /// not given; nothing was deleted
    #[error("Protected resource {resource} matched pattern ({pattern}); refusing to delete without force")]
    ProtectedResourceBlocked { resource: String, pattern: String },

    /// The operator declined; nothing was deleted
    #[error("Confirmation declined for {0}; nothing was changed")]
    ConfirmationDeclined(String),

    /// Execution stopped mid-way; deleted resources stay deleted
    #[error(
        "Destruction of {subject} failed at {resource}: {reason} ({deleted} deleted, {remaining} remaining)"
    )]
    PartialDestruction {
        subject: String,
        resource: String,
        reason: String,
        deleted: usize,
        remaining: usize,
        backup_location: Option<String>,
    },

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// Result type for guard operations
pub type Result<T> = std::result::Result<T, GuardError>;
