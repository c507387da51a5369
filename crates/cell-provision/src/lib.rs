//! Cell Provision - team provisioning orchestration
//!
//! Drives a new team's durable resources to completion: numeric identity,
//! isolation role, encrypted state backend, registry record. Every step is
//! idempotent (check-exists-then-skip), so a failed run is recovered by
//! re-invoking the same entry point; nothing is rolled back automatically.

#![deny(unsafe_code)]

pub mod error;
pub mod provisioner;

pub use error::{ProvisionError, Result};
pub use provisioner::{OnboardRequest, ProvisionOutcome, ProvisionStep, TeamProvisioner};
