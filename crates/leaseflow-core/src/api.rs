//! The authority's binary result shape.
//!
//! Every authority call answers either `Ok(value)` or `Err{code,message}`;
//! in Rust that is `Result<T, ApiError>`.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches `insufficient balance, required: 42` (amount may be fractional).
static REQUIRED_BALANCE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)insufficient balance.*required:\s*([0-9]+(?:\.[0-9]+)?)").ok()
});

/// Error half of an authority result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("authority error {code}: {message}")]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    /// The authority could not be reached or answered garbage.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(503, message)
    }

    /// `404` is the authority's sentinel for "does not exist yet, create it".
    pub const fn is_not_found(&self) -> bool {
        self.code == 404
    }

    /// Balance the authority asked for, when it rejected a deployment for
    /// lack of credit.
    pub fn required_balance(&self) -> Option<f64> {
        REQUIRED_BALANCE
            .as_ref()?
            .captures(&self.message)?
            .get(1)?
            .as_str()
            .parse()
            .ok()
    }
}

/// Wire form of an authority result: `{"Ok": ..}` or `{"Err": {..}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApiResult<T> {
    Ok(T),
    Err(ApiError),
}

impl<T> From<ApiResult<T>> for Result<T, ApiError> {
    fn from(result: ApiResult<T>) -> Self {
        match result {
            ApiResult::Ok(value) => Ok(value),
            ApiResult::Err(err) => Err(err),
        }
    }
}
