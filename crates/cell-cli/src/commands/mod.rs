//! CLI command implementations

pub mod stack;
pub mod team;
