//! Pre-destruction state backup
//!
//! Captures the provisioner state document plus the resource inventory as
//! one JSON snapshot with a SHA-256 digest, addressed by a timestamped
//! location. The snapshot is returned to the caller (and surfaced in the
//! destruction report) rather than written back through the provider;
//! restore is a manual operation by design of the callers.

use crate::error::Result;
use base64::Engine as _;
use cell_provider::{CloudProvider, ProviderError, ResourceRef};
use cell_types::{Environment, TeamId};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::info;

/// A captured pre-destruction snapshot
#[derive(Debug, Clone, serde::Serialize)]
pub struct BackupArtifact {
    /// Timestamped location the snapshot is addressed by
    pub location: String,

    /// Base64 SHA-256 digest of the canonical snapshot bytes
    pub digest_sha256: String,

    /// The snapshot itself
    pub snapshot: serde_json::Value,

    /// Number of resources captured in the inventory
    pub resource_count: usize,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Capture a snapshot of everything about to be destroyed.
pub async fn capture(
    provider: &dyn CloudProvider,
    subject: &str,
    team: Option<(&TeamId, Environment)>,
    resources: &[ResourceRef],
    location: String,
    call_timeout: Duration,
) -> Result<BackupArtifact> {
    let state_doc = match team {
        Some((team, environment)) => {
            tokio::time::timeout(call_timeout, provider.read_state_doc(team, environment))
                .await
                .map_err(|_| ProviderError::Timeout {
                    operation: "read_state_doc".to_string(),
                })
                .and_then(|r| r)?
        }
        None => None,
    };

    let created_at = chrono::Utc::now();
    let snapshot = serde_json::json!({
        "subject": subject,
        "captured_at": created_at.to_rfc3339(),
        "state_doc": state_doc,
        "resources": resources,
    });

    let canonical = serde_json::to_vec(&snapshot).unwrap_or_default();
    let digest_sha256 =
        base64::engine::general_purpose::STANDARD.encode(Sha256::digest(&canonical));

    info!(
        subject,
        location = %location,
        resources = resources.len(),
        digest = %digest_sha256,
        "Captured pre-destruction backup"
    );

    Ok(BackupArtifact {
        location,
        digest_sha256,
        snapshot,
        resource_count: resources.len(),
        created_at,
    })
}
