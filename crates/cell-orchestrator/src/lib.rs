//! Cell Orchestrator - automation-server deployment
//!
//! Builds the deployment descriptor for a team from the fixed tier table
//! and the provisioner's remote-state outputs, applies it with
//! create-or-replace semantics, and polls the health endpoint for a
//! bounded number of attempts. Exhausting the attempts is a warning, not
//! a failure: the deployment may still converge, and callers must not
//! treat "orchestration returned" as "deployment is healthy".

#![deny(unsafe_code)]

pub mod error;
pub mod orchestrator;

pub use error::{OrchestratorError, Result};
pub use orchestrator::AutomationOrchestrator;
