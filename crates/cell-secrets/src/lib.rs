//! Cell Secrets - credential bundle management
//!
//! Each team owns exactly one versioned credential bundle. Mutations go
//! through the manager as whole-object read-modify-write, so dependent
//! deployments only ever observe complete bundle versions. Secret values
//! never reach logs; events carry key names and versions only.

#![deny(unsafe_code)]

pub mod error;
pub mod manager;
pub mod store;

pub use error::{Result, SecretsError};
pub use manager::{BundleChanged, CredentialBundleManager};
pub use store::{BundleStore, InMemoryBundleStore};
