//! The deployment saga.
//!
//! One run takes a deployment request from payment to `Active`:
//!
//! 1. validate the request, quote and pay (nothing exists remotely yet)
//! 2. make sure the client certificate exists
//! 3. open the realtime channel; once it is open, create the deployment
//! 4. follow the pushed transitions in a local history
//! 5. on `LeaseCreated`, close the channel and run [`complete_lease`]
//!
//! The channel is closed before manifest delivery starts, so a late push
//! cannot trigger a second delivery for the same deployment.

use leaseflow_core::deployment::now_ns;
use leaseflow_core::{DeploymentId, DeploymentParams, DeploymentState, StateHistory};
use tracing::{debug, info, warn};

use crate::authority::Authority;
use crate::certificate::{CertificateProvisioner, ProvisionError};
use crate::channel::{ChannelError, ChannelEventKind, ChannelManager};
use crate::completion::{CompletionError, FailureReport, complete_lease, report_failure};
use crate::identity::CallerIdentity;
use crate::payment::{Payment, PaymentCoordinator, PaymentError, PriceQuoter};
use crate::provider::ManifestClient;

#[derive(Debug, thiserror::Error)]
pub enum SagaError {
    #[error(transparent)]
    Validation(leaseflow_core::Error),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("certificate unavailable: {0}")]
    Certificate(#[from] ProvisionError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("deployment {id} failed on the authority: {reason}")]
    FailedOnCanister { id: DeploymentId, reason: String },

    #[error("deployment {id} failed on a client: {reason}")]
    FailedOnClient { id: DeploymentId, reason: String },

    #[error("deployment {id} was closed before it became active")]
    Closed { id: DeploymentId },

    #[error("push for deployment broke its history: {0}")]
    Invariant(FailureReport<leaseflow_core::Error>),

    #[error(transparent)]
    Completion(FailureReport<CompletionError>),

    #[error("realtime channel closed before the deployment completed")]
    ChannelClosed,

    #[error("realtime channel failed: {0}")]
    ChannelFailed(String),
}

/// A deployment that reached `Active`.
#[derive(Debug, Clone)]
pub struct SagaOutcome {
    pub id: DeploymentId,
    /// Locally observed history, seeded with `Initialized`.
    pub history: StateHistory,
    pub payment: Payment,
}

impl SagaOutcome {
    /// Observed state names in arrival order.
    pub fn progress(&self) -> Vec<&'static str> {
        self.history.state_names()
    }
}

/// Collaborators one saga run needs.
pub struct DeploymentSaga<'a> {
    pub authority: &'a dyn Authority,
    pub quoter: &'a PriceQuoter,
    pub payments: &'a PaymentCoordinator,
    pub certificates: &'a CertificateProvisioner,
    pub manifests: &'a ManifestClient,
    pub identity: &'a CallerIdentity,
}

impl DeploymentSaga<'_> {
    /// Drive one deployment. `on_state` sees every state as it is observed.
    pub async fn run(
        &self,
        channel: &mut ChannelManager,
        params: &DeploymentParams,
        on_state: &mut (dyn FnMut(&DeploymentState) + Send),
    ) -> Result<SagaOutcome, SagaError> {
        params.validate().map_err(SagaError::Validation)?;

        let quote = self.quoter.quote().await?;
        let payment = self.payments.pay(quote.icp).await?;
        let cert = self.certificates.ensure_certificate().await?;

        let token = channel.open(self.identity)?;
        let mut tracked: Option<(DeploymentId, StateHistory)> = None;

        loop {
            let Some(event) = channel.next_event().await else {
                return Err(SagaError::ChannelClosed);
            };
            if event.token != token {
                debug!("ignoring event for another listener");
                continue;
            }

            let msg = match event.kind {
                ChannelEventKind::Open => {
                    if tracked.is_some() {
                        continue;
                    }
                    let id = match self.payments.create_with_top_up(params, &payment).await {
                        Ok(id) => id,
                        Err(e) => {
                            channel.close();
                            return Err(e.into());
                        }
                    };
                    info!(deployment_id = %id, "deployment created");
                    let history = StateHistory::new(now_ns());
                    on_state(history.current());
                    tracked = Some((id, history));
                    continue;
                }
                ChannelEventKind::Message(msg) => msg,
                ChannelEventKind::Closed => return Err(SagaError::ChannelClosed),
                ChannelEventKind::Error(reason) => return Err(SagaError::ChannelFailed(reason)),
            };

            let Some((id, history)) = tracked.as_mut() else {
                debug!(deployment_id = %msg.id, "push before our deployment exists");
                continue;
            };
            if msg.id != *id {
                debug!(deployment_id = %msg.id, "push for another deployment");
                continue;
            }
            // The authority may echo the seed we already recorded.
            if msg.update == DeploymentState::Initialized && history.len() == 1 {
                continue;
            }

            if let Err(primary) = history.append(now_ns(), msg.update.clone()) {
                warn!(deployment_id = %id, error = %primary, "rejecting pushed transition");
                channel.close();
                let report = report_failure(self.authority, id, &primary.to_string()).await;
                return Err(SagaError::Invariant(FailureReport { primary, report }));
            }
            on_state(&msg.update);

            match msg.update {
                DeploymentState::Initialized | DeploymentState::DeploymentCreated(_) => {}
                DeploymentState::LeaseCreated(_) => {
                    channel.close();
                    complete_lease(self.authority, self.manifests, id, history, &cert)
                        .await
                        .map_err(SagaError::Completion)?;
                    if let Err(e) = history.append(now_ns(), DeploymentState::Active) {
                        warn!(deployment_id = %id, error = %e, "could not record Active locally");
                    }
                    on_state(&DeploymentState::Active);
                    return Ok(SagaOutcome {
                        id: id.clone(),
                        history: history.clone(),
                        payment,
                    });
                }
                DeploymentState::Active => {
                    channel.close();
                    return Ok(SagaOutcome {
                        id: id.clone(),
                        history: history.clone(),
                        payment,
                    });
                }
                DeploymentState::FailedOnCanister { reason } => {
                    channel.close();
                    return Err(SagaError::FailedOnCanister {
                        id: id.clone(),
                        reason,
                    });
                }
                DeploymentState::FailedOnClient { reason } => {
                    channel.close();
                    return Err(SagaError::FailedOnClient {
                        id: id.clone(),
                        reason,
                    });
                }
                DeploymentState::Closed => {
                    channel.close();
                    return Err(SagaError::Closed { id: id.clone() });
                }
            }
        }
    }
}
