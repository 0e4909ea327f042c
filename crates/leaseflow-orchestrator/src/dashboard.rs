//! Session controller tying the collaborators together.
//!
//! A `Dashboard` is what one logged-in session works with: it owns the
//! realtime channel and the certificate cache, and exposes the user-facing
//! operations (deploy, list, lease status, close).

use std::sync::Arc;

use leaseflow_core::config::{CertificateStorageMode, Config, default_certs_dir};
use leaseflow_core::{ApiError, Deployment, DeploymentId, DeploymentParams, DeploymentState};
use leaseflow_crypto::{CertificateMaterial, CertificateStore};
use serde_json::Value;

use crate::authority::{Authority, HttpAuthority, User, get_or_create_user};
use crate::certificate::{CertificateProvisioner, ProvisionError};
use crate::channel::{ChannelManager, NdjsonPushTransport, PushTransport};
use crate::http::HttpClientError;
use crate::identity::CallerIdentity;
use crate::ledger::{HttpLedger, Ledger};
use crate::payment::{PaymentCoordinator, PaymentError, PriceQuote, PriceQuoter};
use crate::provider::{LeaseId, ManifestClient, ManifestPolicy, ProviderError, lease_status_url};
use crate::reconcile::{ReconcileError, Reconciler};
use crate::relay::{HttpRelay, ReqwestRelay};
use crate::saga::{DeploymentSaga, SagaError, SagaOutcome};

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Http(#[from] HttpClientError),

    #[error(transparent)]
    Authority(#[from] ApiError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("no deployment with id {0}")]
    UnknownDeployment(DeploymentId),

    #[error("deployment {0} has no active lease")]
    NotActive(DeploymentId),

    #[error("no certificate directory configured and no home directory found")]
    NoCertificateDir,
}

/// External collaborators a dashboard is built from.
pub struct Collaborators {
    pub authority: Arc<dyn Authority>,
    pub ledger: Arc<dyn Ledger>,
    pub relay: Arc<dyn HttpRelay>,
    pub transport: Arc<dyn PushTransport>,
    pub certificate_store: Option<CertificateStore>,
}

pub struct Dashboard {
    identity: CallerIdentity,
    authority: Arc<dyn Authority>,
    quoter: PriceQuoter,
    payments: PaymentCoordinator,
    certificates: CertificateProvisioner,
    manifests: ManifestClient,
    channel: ChannelManager,
}

impl Dashboard {
    pub fn new(
        identity: CallerIdentity,
        collaborators: Collaborators,
        config: &Config,
    ) -> Result<Self, ProvisionError> {
        let Collaborators {
            authority,
            ledger,
            relay,
            transport,
            certificate_store,
        } = collaborators;

        let certificates = CertificateProvisioner::new(
            authority.clone(),
            config.certificates.storage,
            certificate_store,
            identity.principal(),
        )?;

        Ok(Self {
            quoter: PriceQuoter::new(
                authority.clone(),
                config.pricing.refresh_interval(),
                config.pricing.markup_percent,
            ),
            payments: PaymentCoordinator::new(authority.clone(), ledger),
            certificates,
            manifests: ManifestClient::new(
                relay,
                ManifestPolicy::from_config(&config.manifest, &config.relay),
            ),
            channel: ChannelManager::new(transport),
            authority,
            identity,
        })
    }

    /// Build a dashboard talking to the configured HTTP endpoints.
    pub fn connect(config: &Config) -> Result<Self, DashboardError> {
        let identity = CallerIdentity::from_credentials(
            config.authority.principal.as_deref(),
            config.authority.access_token.as_deref(),
        );

        let certificate_store = match config.certificates.storage {
            CertificateStorageMode::Authority => None,
            CertificateStorageMode::Local | CertificateStorageMode::Both => {
                let dir = config
                    .certificates
                    .dir
                    .clone()
                    .or_else(default_certs_dir)
                    .ok_or(DashboardError::NoCertificateDir)?;
                Some(CertificateStore::new(dir))
            }
        };

        let collaborators = Collaborators {
            authority: Arc::new(HttpAuthority::new(&config.authority.url, &identity)?),
            ledger: Arc::new(HttpLedger::new(&config.ledger.url, &identity)?),
            relay: Arc::new(ReqwestRelay::new(&config.relay.url, config.relay.timeout())?),
            transport: Arc::new(NdjsonPushTransport::new(config.authority.push_url())),
            certificate_store,
        };
        Ok(Self::new(identity, collaborators, config)?)
    }

    pub const fn identity(&self) -> &CallerIdentity {
        &self.identity
    }

    pub const fn channel(&self) -> &ChannelManager {
        &self.channel
    }

    /// Pay for and provision a new deployment.
    pub async fn deploy(
        &mut self,
        params: &DeploymentParams,
        on_state: &mut (dyn FnMut(&DeploymentState) + Send),
    ) -> Result<SagaOutcome, SagaError> {
        let saga = DeploymentSaga {
            authority: self.authority.as_ref(),
            quoter: &self.quoter,
            payments: &self.payments,
            certificates: &self.certificates,
            manifests: &self.manifests,
            identity: &self.identity,
        };
        saga.run(&mut self.channel, params, on_state).await
    }

    /// Deployments, newest first, after finishing any stranded ones.
    pub async fn deployments(&self) -> Result<Vec<Deployment>, ReconcileError> {
        self.reconciler().refresh().await
    }

    /// Current price quote with markup.
    pub async fn price(&self) -> Result<PriceQuote, PaymentError> {
        self.quoter.quote().await
    }

    pub async fn ensure_user(&self) -> Result<User, ApiError> {
        get_or_create_user(self.authority.as_ref()).await
    }

    pub async fn certificate(&self) -> Result<CertificateMaterial, ProvisionError> {
        self.certificates.ensure_certificate().await
    }

    /// Ask the provider for the status of an active deployment's lease.
    pub async fn lease_status(&self, id: &DeploymentId) -> Result<Value, DashboardError> {
        let deployments = self.reconciler().list().await?;
        let deployment = deployments
            .iter()
            .find(|d| d.id == *id)
            .ok_or_else(|| DashboardError::UnknownDeployment(id.clone()))?;

        let history = &deployment.state_history;
        let (Some(created), Some(lease)) = (history.deployment_created(), history.lease()) else {
            return Err(DashboardError::NotActive(id.clone()));
        };
        if !matches!(deployment.current_state(), DeploymentState::Active) {
            return Err(DashboardError::NotActive(id.clone()));
        }

        let cert = self.certificates.ensure_certificate().await?;
        let url = lease_status_url(&lease.provider_url, LeaseId::primary(created.dseq));
        Ok(self.manifests.query_status(&url, &cert).await?)
    }

    /// Close a deployment and return the refreshed list.
    pub async fn close_deployment(&self, id: &DeploymentId) -> Result<Vec<Deployment>, DashboardError> {
        self.authority.close_deployment(id).await?;
        tracing::info!(deployment_id = %id, "deployment closed");
        Ok(self.deployments().await?)
    }

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler {
            authority: self.authority.as_ref(),
            certificates: &self.certificates,
            manifests: &self.manifests,
        }
    }
}
