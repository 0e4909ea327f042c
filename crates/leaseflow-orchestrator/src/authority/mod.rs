//! The deployment authority: backend of record for deployments and users.
//!
//! Consumed through the [`Authority`] trait so the saga can run against
//! the HTTP gateway or an in-process fake.

mod http;

use async_trait::async_trait;
use leaseflow_core::{ApiError, Deployment, DeploymentId, DeploymentParams, DeploymentState, TimestampNs};
use leaseflow_crypto::CertificateMaterial;
use serde::{Deserialize, Serialize};

pub use http::HttpAuthority;

use crate::ledger::BlockIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    Admin,
    Deployer,
}

/// The caller's user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub role: UserRole,
    pub created_at: TimestampNs,
    /// Client certificate stored on the record, if any.
    #[serde(default)]
    pub mtls_certificate: Option<CertificateMaterial>,
}

/// Remote calls the orchestrator makes on the authority.
#[async_trait]
pub trait Authority: Send + Sync {
    /// Marketplace address of the authority's account for this user.
    async fn address(&self) -> Result<String, ApiError>;

    async fn get_my_user(&self) -> Result<User, ApiError>;

    /// Register the caller; returns the new user id.
    async fn create_user(&self) -> Result<String, ApiError>;

    /// Publish a certificate and store it on the user record; returns the
    /// marketplace transaction hash.
    async fn create_certificate(&self, material: &CertificateMaterial) -> Result<String, ApiError>;

    /// Current price quote for one deployment, in ICP.
    async fn get_deployment_icp_price(&self) -> Result<f64, ApiError>;

    /// Credit the ledger payment at `block_index`; returns the new balance.
    async fn update_icp_balance(&self, block_index: BlockIndex) -> Result<f64, ApiError>;

    async fn create_deployment(&self, params: &DeploymentParams) -> Result<DeploymentId, ApiError>;

    async fn update_deployment_state(
        &self,
        id: &DeploymentId,
        state: &DeploymentState,
    ) -> Result<(), ApiError>;

    async fn get_deployments(&self) -> Result<Vec<Deployment>, ApiError>;

    async fn close_deployment(&self, id: &DeploymentId) -> Result<(), ApiError>;
}

/// Fetch the caller's user record, registering the caller on a 404.
pub async fn get_or_create_user(authority: &dyn Authority) -> Result<User, ApiError> {
    match authority.get_my_user().await {
        Ok(user) => Ok(user),
        Err(e) if e.is_not_found() => {
            let id = authority.create_user().await?;
            tracing::info!(user_id = %id, "registered new user");
            authority.get_my_user().await
        }
        Err(e) => Err(e),
    }
}
