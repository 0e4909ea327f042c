//! Payment coordinator and price quoter.
//!
//! A deployment is paid for up front: the quoted price (plus a small
//! markup) is transferred on the ledger and the receipt is credited on the
//! authority. If the authority still reports an insufficient balance when
//! the deployment is created, exactly one top-up of the shortfall is made
//! and creation is retried exactly once.

use std::sync::Arc;
use std::time::Duration;

use leaseflow_core::amount::{e8s_to_icp, icp_to_e8s};
use leaseflow_core::{ApiError, DeploymentId, DeploymentParams};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::authority::Authority;
use crate::ledger::{BlockIndex, Ledger, LedgerError};

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("failed to fetch price quote: {0}")]
    Quote(ApiError),

    #[error("invalid payment amount: {0} ICP")]
    InvalidAmount(f64),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("payment was transferred but not credited: {0}")]
    Credit(ApiError),

    #[error("deployment creation failed: {0}")]
    Create(ApiError),

    #[error("balance still insufficient after top-up: {0}")]
    StillInsufficient(ApiError),
}

/// A price quote with the markup applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    /// Price as quoted by the authority.
    pub quoted_icp: f64,
    /// Price to charge.
    pub icp: f64,
    pub fetched_at: Instant,
}

/// Caches the authority's price quote and refreshes it once stale.
pub struct PriceQuoter {
    authority: Arc<dyn Authority>,
    refresh_interval: Duration,
    markup_percent: f64,
    cached: Mutex<Option<PriceQuote>>,
}

impl PriceQuoter {
    pub fn new(authority: Arc<dyn Authority>, refresh_interval: Duration, markup_percent: f64) -> Self {
        Self {
            authority,
            refresh_interval,
            markup_percent,
            cached: Mutex::new(None),
        }
    }

    /// The current quote, fetching a new one if the cached one is stale.
    pub async fn quote(&self) -> Result<PriceQuote, PaymentError> {
        let mut cached = self.cached.lock().await;
        if let Some(quote) = *cached
            && quote.fetched_at.elapsed() < self.refresh_interval
        {
            return Ok(quote);
        }

        let quoted_icp = self
            .authority
            .get_deployment_icp_price()
            .await
            .map_err(PaymentError::Quote)?;
        let quote = PriceQuote {
            quoted_icp,
            icp: quoted_icp * (1.0 + self.markup_percent / 100.0),
            fetched_at: Instant::now(),
        };
        *cached = Some(quote);
        Ok(quote)
    }
}

/// Receipt of a completed payment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payment {
    pub amount_e8s: u64,
    pub block_index: BlockIndex,
    /// Balance the authority reported after crediting the payment.
    pub credited_balance: f64,
}

impl Payment {
    pub fn amount_icp(&self) -> f64 {
        e8s_to_icp(self.amount_e8s)
    }
}

pub struct PaymentCoordinator {
    authority: Arc<dyn Authority>,
    ledger: Arc<dyn Ledger>,
}

impl PaymentCoordinator {
    pub fn new(authority: Arc<dyn Authority>, ledger: Arc<dyn Ledger>) -> Self {
        Self { authority, ledger }
    }

    /// Transfer `amount_icp` to the custodial account and credit it.
    pub async fn pay(&self, amount_icp: f64) -> Result<Payment, PaymentError> {
        if !amount_icp.is_finite() || amount_icp <= 0.0 {
            return Err(PaymentError::InvalidAmount(amount_icp));
        }
        let amount_e8s = icp_to_e8s(amount_icp);

        let block_index = self.ledger.transfer(amount_e8s).await?;
        let credited_balance = self
            .authority
            .update_icp_balance(block_index)
            .await
            .map_err(PaymentError::Credit)?;

        info!(amount_e8s, block_index, credited_balance, "payment credited");
        Ok(Payment {
            amount_e8s,
            block_index,
            credited_balance,
        })
    }

    /// Create the deployment, topping up once if the balance falls short.
    pub async fn create_with_top_up(
        &self,
        params: &DeploymentParams,
        payment: &Payment,
    ) -> Result<DeploymentId, PaymentError> {
        let err = match self.authority.create_deployment(params).await {
            Ok(id) => return Ok(id),
            Err(e) => e,
        };
        let Some(required) = err.required_balance() else {
            return Err(PaymentError::Create(err));
        };

        let shortfall = shortfall(required, payment.credited_balance);
        warn!(required, credited = payment.credited_balance, shortfall, "balance insufficient, topping up");
        self.pay(shortfall).await?;

        match self.authority.create_deployment(params).await {
            Ok(id) => Ok(id),
            Err(e) if e.required_balance().is_some() => Err(PaymentError::StillInsufficient(e)),
            Err(e) => Err(PaymentError::Create(e)),
        }
    }
}

/// Amount still missing; the full requirement when the credited balance
/// does not explain the gap.
fn shortfall(required: f64, credited: f64) -> f64 {
    let missing = required - credited;
    if credited.is_finite() && missing > 0.0 {
        missing
    } else {
        required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortfall_is_difference() {
        assert!((shortfall(42.0, 30.0) - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn shortfall_falls_back_to_requirement() {
        assert!((shortfall(42.0, 50.0) - 42.0).abs() < f64::EPSILON);
        assert!((shortfall(42.0, f64::NAN) - 42.0).abs() < f64::EPSILON);
    }
}
