//! Certificate provisioner.
//!
//! Makes sure the user has exactly one client certificate before anything
//! talks to a provider. The first successful lookup or creation is cached
//! for the session; concurrent callers wait on the same lock, so two
//! certificates are never created for one user.

use std::sync::Arc;

use leaseflow_core::ApiError;
use leaseflow_core::config::CertificateStorageMode;
use leaseflow_crypto::{CertError, CertificateMaterial, CertificateStore, generate_client_certificate};
use tokio::sync::Mutex;
use tracing::info;

use crate::authority::{Authority, get_or_create_user};

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("authority error while provisioning certificate: {0}")]
    Authority(#[from] ApiError),

    #[error(transparent)]
    Certificate(#[from] CertError),

    #[error("certificate storage mode {0:?} needs a local certificate directory")]
    NoLocalStore(CertificateStorageMode),
}

pub struct CertificateProvisioner {
    authority: Arc<dyn Authority>,
    storage: CertificateStorageMode,
    local: Option<CertificateStore>,
    principal: String,
    cache: Mutex<Option<CertificateMaterial>>,
}

impl CertificateProvisioner {
    pub fn new(
        authority: Arc<dyn Authority>,
        storage: CertificateStorageMode,
        local: Option<CertificateStore>,
        principal: impl Into<String>,
    ) -> Result<Self, ProvisionError> {
        if storage != CertificateStorageMode::Authority && local.is_none() {
            return Err(ProvisionError::NoLocalStore(storage));
        }
        let local = local.filter(|_| storage != CertificateStorageMode::Authority);
        Ok(Self {
            authority,
            storage,
            local,
            principal: principal.into(),
            cache: Mutex::new(None),
        })
    }

    /// Get the user's certificate, creating and persisting it if needed.
    pub async fn ensure_certificate(&self) -> Result<CertificateMaterial, ProvisionError> {
        let mut cache = self.cache.lock().await;
        if let Some(material) = cache.as_ref() {
            return Ok(material.clone());
        }

        let material = match self.load_stored().await? {
            Some(material) => material,
            None => self.create().await?,
        };
        *cache = Some(material.clone());
        Ok(material)
    }

    /// The cached certificate, without touching any store.
    pub async fn cached(&self) -> Option<CertificateMaterial> {
        self.cache.lock().await.clone()
    }

    const fn uses_authority(&self) -> bool {
        matches!(
            self.storage,
            CertificateStorageMode::Authority | CertificateStorageMode::Both
        )
    }

    async fn load_stored(&self) -> Result<Option<CertificateMaterial>, ProvisionError> {
        if let Some(store) = &self.local
            && let Some(material) = store.load(&self.principal)?
        {
            return Ok(Some(material));
        }

        if !self.uses_authority() {
            return Ok(None);
        }

        let user = get_or_create_user(self.authority.as_ref()).await?;
        if let Some(material) = user.mtls_certificate {
            if let Some(store) = &self.local {
                store.save(&self.principal, &material)?;
            }
            return Ok(Some(material));
        }
        Ok(None)
    }

    async fn create(&self) -> Result<CertificateMaterial, ProvisionError> {
        let address = self.authority.address().await?;
        let material = generate_client_certificate(&address)?;

        if self.uses_authority() {
            let tx_hash = self.authority.create_certificate(&material).await?;
            info!(%address, %tx_hash, "published client certificate");
        }
        if let Some(store) = &self.local {
            store.save(&self.principal, &material)?;
            info!(path = %store.path().display(), "saved client certificate locally");
        }
        Ok(material)
    }
}
