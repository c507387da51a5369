//! Cell Guard - safety gate for destructive operations
//!
//! Every deletion path runs through the same state machine: check the
//! candidate resources against protected patterns, summarize the impact,
//! optionally snapshot state to a backup location, obtain tiered
//! confirmation, then execute. A declined confirmation or a protected
//! match leaves everything untouched; a mid-execution failure stops and
//! reports what was deleted and what remains, never restoring
//! automatically.

#![deny(unsafe_code)]

pub mod backup;
pub mod confirm;
pub mod error;
pub mod guard;
pub mod matcher;

pub use backup::BackupArtifact;
pub use confirm::{AutoApprove, Confirmer, DenyAll};
pub use error::{GuardError, Result};
pub use guard::{DestroyPlan, DestructionReport, ImpactReport, SafetyGuard};
pub use matcher::ProtectedMatcher;
