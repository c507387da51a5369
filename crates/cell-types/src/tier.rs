//! Tier size classes
//!
//! A Tier is a named size class driving compute sizing for a team's
//! automation-server deployment. The table is fixed; scaling a team means
//! moving it to a different tier, not tuning individual numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named size class for a team's deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Small,
    Medium,
    Large,
}

/// Compute sizing for a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierSizing {
    /// CPU units
    pub cpu: u32,
    /// Memory in MiB
    pub memory: u32,
    /// Desired replica count
    pub replicas: u32,
}

impl Tier {
    /// Fixed sizing table for this tier.
    pub fn sizing(&self) -> TierSizing {
        match self {
            Tier::Small => TierSizing {
                cpu: 256,
                memory: 512,
                replicas: 1,
            },
            Tier::Medium => TierSizing {
                cpu: 512,
                memory: 1024,
                replicas: 2,
            },
            Tier::Large => TierSizing {
                cpu: 1024,
                memory: 2048,
                replicas: 3,
            },
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Small
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Small => f.write_str("small"),
            Tier::Medium => f.write_str("medium"),
            Tier::Large => f.write_str("large"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(Tier::Small),
            "medium" => Ok(Tier::Medium),
            "large" => Ok(Tier::Large),
            other => Err(format!("unknown tier {:?}, expected small|medium|large", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizing_table() {
        assert_eq!(
            Tier::Large.sizing(),
            TierSizing {
                cpu: 1024,
                memory: 2048,
                replicas: 3
            }
        );
        assert_eq!(Tier::Small.sizing().replicas, 1);
        assert_eq!(Tier::Medium.sizing().memory, 1024);
    }

    #[test]
    fn test_parse() {
        assert_eq!("Large".parse::<Tier>().unwrap(), Tier::Large);
        assert!("xlarge".parse::<Tier>().is_err());
    }
}
