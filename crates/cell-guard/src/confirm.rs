//! Confirmation seam
//!
//! The guard never talks to a terminal itself; it asks an injected
//! `Confirmer`. The CLI provides an interactive implementation, tests and
//! `--yes` flows use the static ones below.

use async_trait::async_trait;

/// Answers confirmation prompts for destructive operations
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// Simple yes/no prompt.
    async fn confirm(&self, prompt: &str) -> bool;

    /// Prompt that requires retyping `expected` exactly, used for
    /// critical-environment destruction.
    async fn confirm_typed(&self, prompt: &str, expected: &str) -> bool;
}

/// Approves everything; non-interactive `--yes` runs
pub struct AutoApprove;

#[async_trait]
impl Confirmer for AutoApprove {
    async fn confirm(&self, _prompt: &str) -> bool {
        true
    }

    async fn confirm_typed(&self, _prompt: &str, _expected: &str) -> bool {
        true
    }
}

/// Declines everything
pub struct DenyAll;

#[async_trait]
impl Confirmer for DenyAll {
    async fn confirm(&self, _prompt: &str) -> bool {
        false
    }

    async fn confirm_typed(&self, _prompt: &str, _expected: &str) -> bool {
        false
    }
}
