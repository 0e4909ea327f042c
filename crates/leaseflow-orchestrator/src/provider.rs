//! Provider manifest client.
//!
//! Talks to the provider that won the lease, through the relay, using the
//! user's client certificate. Manifest delivery retries a fixed number of
//! times, only while the provider says it has not seen the lease yet.

use std::sync::Arc;
use std::time::Duration;

use leaseflow_core::config::{ManifestConfig, RelayConfig};
use leaseflow_crypto::CertificateMaterial;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::http::join_url;
use crate::relay::{HttpRelay, RelayError, RelayMethod, RelayRequest};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("provider still has no lease after {attempts} attempts: {message}")]
    LeaseNotVisible { attempts: u32, message: String },

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Identifies one lease of a deployment on the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseId {
    pub dseq: u64,
    pub gseq: u32,
    pub oseq: u32,
}

impl LeaseId {
    /// Deployments are created with a single group and a single order.
    pub const fn primary(dseq: u64) -> Self {
        Self {
            dseq,
            gseq: 1,
            oseq: 1,
        }
    }
}

/// `PUT` target for a deployment's manifest.
pub fn manifest_url(provider_url: &str, dseq: u64) -> String {
    join_url(provider_url, &format!("deployment/{dseq}/manifest"))
}

/// `GET` target for a lease's status.
pub fn lease_status_url(provider_url: &str, lease: LeaseId) -> String {
    join_url(
        provider_url,
        &format!("lease/{}/{}/{}/status", lease.dseq, lease.gseq, lease.oseq),
    )
}

/// Re-serialise a manifest with object keys sorted at every level.
pub fn normalize_manifest(manifest_json: &str) -> Result<String, ProviderError> {
    let value: Value = serde_json::from_str(manifest_json)
        .map_err(|e| ProviderError::InvalidManifest(e.to_string()))?;
    serde_json::to_string(&sort_keys(value))
        .map_err(|e| ProviderError::InvalidManifest(e.to_string()))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Timing and matching rules for manifest delivery.
#[derive(Debug, Clone)]
pub struct ManifestPolicy {
    /// Wait before the first attempt.
    pub initial_grace: Duration,
    /// Fixed wait between attempts.
    pub retry_delay: Duration,
    pub max_attempts: u32,
    /// Error text that marks the lease as not yet visible to the provider.
    pub lease_missing_marker: String,
    /// Provider socket timeout handed to the relay.
    pub request_timeout: Duration,
}

impl Default for ManifestPolicy {
    fn default() -> Self {
        Self::from_config(&ManifestConfig::default(), &RelayConfig::default())
    }
}

impl ManifestPolicy {
    pub fn from_config(manifest: &ManifestConfig, relay: &RelayConfig) -> Self {
        Self {
            initial_grace: manifest.initial_grace(),
            retry_delay: manifest.retry_delay(),
            max_attempts: manifest.max_attempts.max(1),
            lease_missing_marker: manifest.lease_missing_marker.clone(),
            request_timeout: relay.timeout(),
        }
    }

    fn is_lease_missing(&self, err: &ProviderError) -> bool {
        let text = match err {
            ProviderError::Status { body, .. } | ProviderError::Relay(RelayError::Relay { body, .. }) => {
                body.as_str()
            }
            _ => return false,
        };
        text.contains(&self.lease_missing_marker)
    }
}

/// Client for provider endpoints reached through the relay.
#[derive(Clone)]
pub struct ManifestClient {
    relay: Arc<dyn HttpRelay>,
    policy: ManifestPolicy,
}

impl ManifestClient {
    pub fn new(relay: Arc<dyn HttpRelay>, policy: ManifestPolicy) -> Self {
        Self { relay, policy }
    }

    pub const fn policy(&self) -> &ManifestPolicy {
        &self.policy
    }

    /// Deliver a manifest, retrying while the lease is not yet visible.
    pub async fn deliver(
        &self,
        manifest_url: &str,
        manifest_json: &str,
        cert: &CertificateMaterial,
    ) -> Result<(), ProviderError> {
        let body = normalize_manifest(manifest_json)?;
        let max_attempts = self.policy.max_attempts.max(1);

        tokio::time::sleep(self.policy.initial_grace).await;

        let mut attempt = 1;
        loop {
            debug!(url = manifest_url, attempt, "sending manifest");
            let err = match self.put(manifest_url, &body, cert).await {
                Ok(()) => {
                    info!(url = manifest_url, attempt, "manifest delivered");
                    return Ok(());
                }
                Err(e) => e,
            };

            if !self.policy.is_lease_missing(&err) {
                return Err(err);
            }
            if attempt >= max_attempts {
                return Err(ProviderError::LeaseNotVisible {
                    attempts: attempt,
                    message: err.to_string(),
                });
            }

            warn!(
                url = manifest_url,
                attempt,
                delay_secs = self.policy.retry_delay.as_secs(),
                "provider has no lease yet, retrying"
            );
            tokio::time::sleep(self.policy.retry_delay).await;
            attempt += 1;
        }
    }

    /// Fetch a lease's status document. Single attempt.
    pub async fn query_status(
        &self,
        status_url: &str,
        cert: &CertificateMaterial,
    ) -> Result<Value, ProviderError> {
        let resp = self
            .relay
            .send(&self.request(RelayMethod::Get, status_url, None, cert))
            .await?;
        if !resp.is_success() {
            return Err(ProviderError::Status {
                status: resp.status,
                body: resp.body,
            });
        }
        serde_json::from_str(&resp.body).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    async fn put(
        &self,
        url: &str,
        body: &str,
        cert: &CertificateMaterial,
    ) -> Result<(), ProviderError> {
        let resp = self
            .relay
            .send(&self.request(RelayMethod::Put, url, Some(body.to_string()), cert))
            .await?;
        if resp.is_success() {
            Ok(())
        } else {
            Err(ProviderError::Status {
                status: resp.status,
                body: resp.body,
            })
        }
    }

    fn request(
        &self,
        method: RelayMethod,
        url: &str,
        body: Option<String>,
        cert: &CertificateMaterial,
    ) -> RelayRequest {
        RelayRequest {
            method,
            url: url.to_string(),
            cert_pem: cert.certificate.clone(),
            key_pem: cert.private_key.clone(),
            body,
            timeout: u64::try_from(self.policy.request_timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}
