//! HTTP relay that performs mTLS calls to providers on our behalf.
//!
//! The relay takes the target URL, the client certificate and key, and an
//! optional body, makes the call, and hands back the provider's status and
//! raw body.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::http::{HttpClientError, build_client};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("relay request failed: {0}")]
    Transport(String),

    #[error("relay error ({status}): {body}")]
    Relay { status: u16, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelayMethod {
    Get,
    Put,
}

/// Body POSTed to the relay endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub method: RelayMethod,
    pub url: String,
    pub cert_pem: String,
    pub key_pem: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Socket timeout for the provider call, in milliseconds.
    pub timeout: u64,
}

impl std::fmt::Debug for RelayRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("body_len", &self.body.as_ref().map(String::len))
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// The provider's answer as proxied back by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub status: u16,
    #[serde(default)]
    pub body: String,
}

impl RelayResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpRelay: Send + Sync {
    async fn send(&self, request: &RelayRequest) -> Result<RelayResponse, RelayError>;
}

/// Relay client over reqwest.
#[derive(Debug)]
pub struct ReqwestRelay {
    http: reqwest::Client,
    url: String,
}

impl ReqwestRelay {
    /// `timeout` bounds the whole relay round-trip; it should be at least
    /// the provider timeout handed to the relay.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, HttpClientError> {
        if url.is_empty() {
            return Err(HttpClientError::Config("relay url is empty".into()));
        }
        Ok(Self {
            http: build_client(None, Some(timeout + Duration::from_secs(5)))?,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl HttpRelay for ReqwestRelay {
    async fn send(&self, request: &RelayRequest) -> Result<RelayResponse, RelayError> {
        let resp = self
            .http
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            // The relay reports provider failures as its own error status
            // with the provider's text as body.
            let body = resp.text().await.unwrap_or_default();
            return Err(RelayError::Relay {
                status: status.as_u16(),
                body,
            });
        }

        resp.json()
            .await
            .map_err(|e| RelayError::Transport(format!("invalid relay response: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn request_json_uses_relay_field_names() {
        let request = RelayRequest {
            method: RelayMethod::Put,
            url: "https://provider:8443/deployment/7/manifest".into(),
            cert_pem: "CERT".into(),
            key_pem: "KEY".into(),
            body: Some("[]".into()),
            timeout: 60_000,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["method"], "PUT");
        assert_eq!(json["certPem"], "CERT");
        assert_eq!(json["keyPem"], "KEY");
        assert_eq!(json["timeout"], 60_000);
    }

    #[test]
    fn get_request_omits_body() {
        let request = RelayRequest {
            method: RelayMethod::Get,
            url: "u".into(),
            cert_pem: "c".into(),
            key_pem: "k".into(),
            body: None,
            timeout: 1,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("body").is_none());
    }

    #[test]
    fn debug_hides_key() {
        let request = RelayRequest {
            method: RelayMethod::Get,
            url: "u".into(),
            cert_pem: "c".into(),
            key_pem: "SECRET".into(),
            body: None,
            timeout: 1,
        };
        assert!(!format!("{request:?}").contains("SECRET"));
    }

    #[test]
    fn success_range() {
        assert!(RelayResponse { status: 204, body: String::new() }.is_success());
        assert!(!RelayResponse { status: 404, body: String::new() }.is_success());
    }
}
