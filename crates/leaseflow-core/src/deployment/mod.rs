//! Deployment model: identifiers, parameters, states and history.

mod history;
mod params;
mod state;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use history::{HistoryEntry, StateHistory, TimestampNs, now_ns, to_utc};
pub use params::{
    DeploymentParams, EnvVar, IMAGE_LEN, MAX_COMMAND_ARGS, MAX_ENV_VARS, MAX_FIELD_LEN,
    MAX_PORTS, NAME_LEN, PortExposure, Tier, TierResources, VolumeMount,
};
pub use state::{DeploymentCreated, DeploymentState, LeaseCreated};

/// Opaque deployment identifier assigned by the authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(String);

impl DeploymentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeploymentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for DeploymentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A deployment as recorded by the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    /// Principal of the user who requested it.
    pub owner: String,
    pub params: DeploymentParams,
    /// Price in ICP, fixed at submission.
    pub icp_price: f64,
    pub state_history: StateHistory,
}

impl Deployment {
    pub fn current_state(&self) -> &DeploymentState {
        self.state_history.current()
    }

    pub fn created_at(&self) -> TimestampNs {
        self.state_history.created_at()
    }

    /// Stranded between lease creation and manifest delivery.
    pub fn needs_completion(&self) -> bool {
        matches!(self.state_history.current(), DeploymentState::LeaseCreated(_))
    }
}

/// Sort deployments most recent first by their `Initialized` timestamp.
pub fn sort_newest_first(deployments: &mut [Deployment]) {
    deployments.sort_by_key(|d| std::cmp::Reverse(d.created_at()));
}
