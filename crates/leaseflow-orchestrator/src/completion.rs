//! The post-lease routine shared by the saga and the reconciler.
//!
//! Once a lease exists the manifest recorded in `DeploymentCreated` has to
//! reach the provider, and the deployment is then confirmed `Active`. Any
//! failure is reported back to the authority as `FailedOnClient`. That
//! report is best-effort: if it fails too, it is logged and the primary
//! failure is returned as-is.

use leaseflow_core::{ApiError, DeploymentId, DeploymentState, StateHistory};
use leaseflow_crypto::CertificateMaterial;
use tracing::{error, info};

use crate::authority::Authority;
use crate::provider::{ManifestClient, ProviderError, manifest_url};

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("history has no DeploymentCreated entry")]
    MissingDeploymentCreated,

    #[error("history has no LeaseCreated entry")]
    MissingLease,

    #[error("manifest delivery failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("failed to confirm deployment as Active: {0}")]
    Confirm(ApiError),
}

/// A primary failure together with the outcome of reporting it.
#[derive(Debug, thiserror::Error)]
#[error("{primary}")]
pub struct FailureReport<E>
where
    E: std::error::Error + 'static,
{
    pub primary: E,
    /// Result of recording `FailedOnClient` on the authority.
    pub report: Result<(), ApiError>,
}

impl<E> FailureReport<E>
where
    E: std::error::Error + 'static,
{
    pub const fn reported(&self) -> bool {
        self.report.is_ok()
    }
}

/// Record `FailedOnClient{reason}` for `id`, logging if it cannot be recorded.
pub async fn report_failure(
    authority: &dyn Authority,
    id: &DeploymentId,
    reason: &str,
) -> Result<(), ApiError> {
    let state = DeploymentState::failed_on_client(reason);
    let result = authority.update_deployment_state(id, &state).await;
    if let Err(e) = &result {
        error!(deployment_id = %id, %reason, error = %e, "failed to report client failure");
    }
    result
}

/// Deliver the manifest to the leased provider and confirm `Active`.
pub async fn complete_lease(
    authority: &dyn Authority,
    client: &ManifestClient,
    id: &DeploymentId,
    history: &StateHistory,
    cert: &CertificateMaterial,
) -> Result<(), FailureReport<CompletionError>> {
    match deliver_and_confirm(authority, client, id, history, cert).await {
        Ok(()) => {
            info!(deployment_id = %id, "deployment active");
            Ok(())
        }
        Err(primary) => {
            error!(deployment_id = %id, error = %primary, "deployment completion failed");
            let report = report_failure(authority, id, &primary.to_string()).await;
            Err(FailureReport { primary, report })
        }
    }
}

async fn deliver_and_confirm(
    authority: &dyn Authority,
    client: &ManifestClient,
    id: &DeploymentId,
    history: &StateHistory,
    cert: &CertificateMaterial,
) -> Result<(), CompletionError> {
    let created = history
        .deployment_created()
        .ok_or(CompletionError::MissingDeploymentCreated)?;
    let lease = history.lease().ok_or(CompletionError::MissingLease)?;

    let url = manifest_url(&lease.provider_url, created.dseq);
    client.deliver(&url, &created.manifest, cert).await?;

    authority
        .update_deployment_state(id, &DeploymentState::Active)
        .await
        .map_err(CompletionError::Confirm)
}
