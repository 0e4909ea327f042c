//! Deployment listing and reconciliation.
//!
//! A deployment whose current state is `LeaseCreated` was left behind by an
//! interrupted saga. Reconciliation finishes each one through the same
//! [`complete_lease`] routine the saga uses, one at a time; a failure on
//! one deployment does not stop the others.

use leaseflow_core::deployment::sort_newest_first;
use leaseflow_core::{ApiError, Deployment, DeploymentId};
use leaseflow_crypto::CertificateMaterial;
use tracing::{info, warn};

use crate::authority::Authority;
use crate::certificate::{CertificateProvisioner, ProvisionError};
use crate::completion::complete_lease;
use crate::provider::ManifestClient;

/// Upper bound on list/reconcile rounds in one refresh.
pub const MAX_REFRESH_PASSES: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to list deployments: {0}")]
    List(ApiError),

    #[error("cannot reconcile without a certificate: {0}")]
    Certificate(#[from] ProvisionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCompletion {
    pub id: DeploymentId,
    pub reason: String,
    /// Whether `FailedOnClient` made it to the authority.
    pub reported: bool,
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub completed: Vec<DeploymentId>,
    pub failed: Vec<FailedCompletion>,
}

impl ReconcileReport {
    /// Whether the authority's view changed, so the list is stale.
    pub fn changed(&self) -> bool {
        !self.completed.is_empty() || self.failed.iter().any(|f| f.reported)
    }
}

pub struct Reconciler<'a> {
    pub authority: &'a dyn Authority,
    pub certificates: &'a CertificateProvisioner,
    pub manifests: &'a ManifestClient,
}

impl Reconciler<'_> {
    /// All of the caller's deployments, most recent first.
    pub async fn list(&self) -> Result<Vec<Deployment>, ReconcileError> {
        let mut deployments = self
            .authority
            .get_deployments()
            .await
            .map_err(ReconcileError::List)?;
        sort_newest_first(&mut deployments);
        Ok(deployments)
    }

    /// Finish every deployment stranded at `LeaseCreated`.
    ///
    /// The certificate is only loaded when there is something to finish.
    pub async fn reconcile(&self, deployments: &[Deployment]) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::default();
        let mut cert: Option<CertificateMaterial> = None;

        for deployment in deployments.iter().filter(|d| d.needs_completion()) {
            if cert.is_none() {
                cert = Some(self.certificates.ensure_certificate().await?);
            }
            let Some(cert) = cert.as_ref() else {
                continue;
            };

            info!(deployment_id = %deployment.id, "resuming stranded deployment");
            match complete_lease(
                self.authority,
                self.manifests,
                &deployment.id,
                &deployment.state_history,
                cert,
            )
            .await
            {
                Ok(()) => report.completed.push(deployment.id.clone()),
                Err(failure) => {
                    warn!(deployment_id = %deployment.id, error = %failure, "reconciliation failed");
                    report.failed.push(FailedCompletion {
                        id: deployment.id.clone(),
                        reason: failure.primary.to_string(),
                        reported: failure.reported(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// List and reconcile, refetching while reconciliation changes state.
    pub async fn refresh(&self) -> Result<Vec<Deployment>, ReconcileError> {
        let mut deployments = self.list().await?;
        for _ in 0..MAX_REFRESH_PASSES {
            let report = self.reconcile(&deployments).await?;
            if !report.changed() {
                break;
            }
            deployments = self.list().await?;
        }
        Ok(deployments)
    }
}
