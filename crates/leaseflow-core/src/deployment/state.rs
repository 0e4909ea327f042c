//! Deployment state variants as recorded by the authority.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Payload of the `DeploymentCreated` state.
///
/// Carries the manifest that has to reach the provider once a lease exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentCreated {
    /// Workload manifest (JSON) to deliver to the provider.
    pub manifest: String,
    /// Provisioning sequence number on the marketplace.
    pub dseq: u64,
    /// Marketplace transaction hash of the deployment creation.
    pub tx_hash: String,
}

/// Payload of the `LeaseCreated` state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseCreated {
    /// Base URL of the provider that accepted the lease.
    pub provider_url: String,
    /// Marketplace transaction hash of the lease creation.
    pub tx_hash: String,
}

/// One step in a deployment's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentState {
    Initialized,
    DeploymentCreated(DeploymentCreated),
    LeaseCreated(LeaseCreated),
    Active,
    FailedOnCanister { reason: String },
    FailedOnClient { reason: String },
    Closed,
}

impl DeploymentState {
    /// Variant name, as shown in progress lists and status output.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Initialized => "Initialized",
            Self::DeploymentCreated(_) => "DeploymentCreated",
            Self::LeaseCreated(_) => "LeaseCreated",
            Self::Active => "Active",
            Self::FailedOnCanister { .. } => "FailedOnCanister",
            Self::FailedOnClient { .. } => "FailedOnClient",
            Self::Closed => "Closed",
        }
    }

    /// Whether no automated transition may follow this state.
    pub const fn is_terminal(&self) -> bool {
        match self {
            Self::FailedOnCanister { .. } | Self::FailedOnClient { .. } | Self::Closed => true,
            Self::Initialized | Self::DeploymentCreated(_) | Self::LeaseCreated(_) | Self::Active => {
                false
            }
        }
    }

    /// Whether this state records a failure.
    pub const fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::FailedOnCanister { .. } | Self::FailedOnClient { .. }
        )
    }

    /// Failure reason, if this is a failure state.
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::FailedOnCanister { reason } | Self::FailedOnClient { reason } => Some(reason),
            Self::Initialized
            | Self::DeploymentCreated(_)
            | Self::LeaseCreated(_)
            | Self::Active
            | Self::Closed => None,
        }
    }

    /// Build a client-side failure state.
    pub fn failed_on_client(reason: impl Into<String>) -> Self {
        Self::FailedOnClient {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
