//! Durable model storage
//!
//! - [`registry`]: the versioning/staging ledger, persisted as one JSON snapshot
//! - [`artifacts`]: deterministic artifact paths and all-or-nothing artifact writes
//! - [`model_ref`]: model references and name validation

pub mod artifacts;
pub mod model_ref;
pub mod registry;

pub use artifacts::{ArtifactGuard, ArtifactStore};
pub use model_ref::{validate_model_name, ModelRef};
pub use registry::{
    ModelEntry, ModelRegistry, ModelSummary, NewVersion, ResolvedModel, StageChange, VersionRecord,
    VersionReservation,
};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle label of a model version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Development,
    Staging,
    Production,
    Archived,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Development, Stage::Staging, Stage::Production, Stage::Archived];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Development => "development",
            Stage::Staging => "staging",
            Stage::Production => "production",
            Stage::Archived => "archived",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Stage::ALL.into_iter().find(|stage| stage.as_str() == s).ok_or_else(|| {
            Error::invalid_argument(format!(
                "Invalid stage '{}'. Valid stages are: development, staging, production, archived",
                s
            ))
        })
    }
}
