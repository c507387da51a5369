//! Cell Types - Core types for team cell provisioning
//!
//! cellkit manages per-team infrastructure cells: a unique numeric identity
//! and derived network range, an isolated state backend, a credential
//! bundle, and a deployed automation-server instance.
//!
//! ## Architectural Boundaries
//!
//! - **cellkit** owns: identity allocation, provisioning orchestration,
//!   lifecycle operations, destructive-action safety
//! - **Cloud control plane** owns: the actual roles, buckets, tables,
//!   services and load balancers (behind the `CloudProvider` seam)
//! - **IaC engine / review pipeline** owns: template stamping and
//!   plan/apply summaries (consumed only as a notification sink)
//!
//! ## Key Concepts
//!
//! - **Team**: a tenant unit with its own identity, network range,
//!   credentials, and deployment
//! - **Tier**: a named size class mapping to fixed compute sizing
//! - **CredentialBundle**: the single versioned object holding all of a
//!   team's secret material
//! - **OrgConfig**: explicit immutable configuration passed to every
//!   component at construction, never read from ambient process state

#![deny(unsafe_code)]

pub mod bundle;
pub mod config;
pub mod deployment;
pub mod events;
pub mod ids;
pub mod team;
pub mod tier;

// Re-export main types
pub use bundle::CredentialBundle;
pub use config::{HealthPollConfig, NamingConventions, OrgConfig, ProtectedPattern};
pub use deployment::{DeploymentDescriptor, DeploymentRecord, HealthState};
pub use events::{CellEvent, CellEventEnvelope, EventSeverity};
pub use ids::{InvalidTeamId, TeamId};
pub use team::{Environment, StateBackend, Team, TeamStatus};
pub use tier::{Tier, TierSizing};
