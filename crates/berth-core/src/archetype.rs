//! Service archetypes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// The kind of service a release deploys
///
/// Each archetype has its own chart template and values schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Archetype {
    /// HTTP API behind an ingress
    Api,
    /// Game host process
    #[serde(alias = "host")]
    GameHost,
}

impl Archetype {
    /// Segment used in generated release names
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::GameHost => "host",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Archetype {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "host" | "game-host" | "gamehost" => Ok(Self::GameHost),
            other => Err(CoreError::UnknownArchetype(other.to_string())),
        }
    }
}
