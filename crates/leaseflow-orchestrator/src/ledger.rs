//! Ledger payments.

use async_trait::async_trait;
use leaseflow_core::api::ApiResult;
use serde_json::json;

use crate::http::{HttpClientError, build_client, join_url};
use crate::identity::CallerIdentity;

/// Block index of a ledger transfer; the receipt the authority credits.
pub type BlockIndex = u64;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("transfer rejected: {0}")]
    Rejected(String),

    #[error("ledger unreachable: {0}")]
    Transport(String),
}

/// Transfers from the caller's account to the authority's custodial account.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn transfer(&self, amount_e8s: u64) -> Result<BlockIndex, LedgerError>;
}

/// Ledger gateway client: `POST {base}/transfer {"amount_e8s": n}`.
#[derive(Debug)]
pub struct HttpLedger {
    http: reqwest::Client,
    transfer_url: String,
}

impl HttpLedger {
    pub fn new(base_url: &str, identity: &CallerIdentity) -> Result<Self, HttpClientError> {
        if base_url.is_empty() {
            return Err(HttpClientError::Config("ledger url is empty".into()));
        }
        Ok(Self {
            http: build_client(identity.access_token(), None)?,
            transfer_url: join_url(base_url, "transfer"),
        })
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn transfer(&self, amount_e8s: u64) -> Result<BlockIndex, LedgerError> {
        let resp = self
            .http
            .post(&self.transfer_url)
            .json(&json!({ "amount_e8s": amount_e8s }))
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LedgerError::Transport(format!("{status}: {body}")));
        }

        let result: ApiResult<BlockIndex> = resp
            .json()
            .await
            .map_err(|e| LedgerError::Transport(format!("invalid response: {e}")))?;
        match result {
            ApiResult::Ok(block_index) => {
                tracing::info!(amount_e8s, block_index, "ledger transfer completed");
                Ok(block_index)
            }
            ApiResult::Err(e) => Err(LedgerError::Rejected(e.message)),
        }
    }
}
