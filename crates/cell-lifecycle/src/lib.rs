//! Cell Lifecycle - the unified operator facade
//!
//! One entry point per lifecycle operation, composing the provisioner,
//! deployment orchestrator, credential bundle manager, and safety guard.
//! Callers (the CLI, mostly) construct one `LifecycleOperator` and drive
//! everything through it; events from all components surface on a single
//! broadcast stream.

#![deny(unsafe_code)]

pub mod error;
pub mod operator;

pub use error::{LifecycleError, Result};
pub use operator::{
    DecommissionOptions, DecommissionReport, DiagnosisReport, LifecycleOperator, OnboardSummary,
    RotationReport,
};
