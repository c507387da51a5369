//! Cell Provider - the cloud control-plane seam
//!
//! Everything cellkit does to the outside world goes through the
//! [`CloudProvider`] trait: identity roles, state buckets and lock tables,
//! container services and load balancers, budget alerts, and the
//! remote-state documents that carry provisioner outputs to the
//! orchestrator. All calls are potentially long-running network
//! operations; callers wrap them in timeouts.
//!
//! The in-memory implementation records every resource and supports
//! failure injection, which is how the provisioner's resume-after-failure
//! behavior is tested.

#![deny(unsafe_code)]

pub mod error;
pub mod memory;
pub mod provider;

pub use error::{ProviderError, Result};
pub use memory::{InMemoryCloudProvider, ProviderState};
pub use provider::{
    BudgetAlerts, CloudProvider, ResourceKind, ResourceRef, ServiceStatus, TargetHealth,
};
