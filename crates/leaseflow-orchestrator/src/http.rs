//! Shared reqwest client construction for the HTTP adapters.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

/// Errors building an HTTP adapter.
#[derive(Debug, thiserror::Error)]
pub enum HttpClientError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Build a client with an optional bearer token and request timeout.
pub fn build_client(
    bearer: Option<&str>,
    timeout: Option<Duration>,
) -> Result<reqwest::Client, HttpClientError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = bearer {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| HttpClientError::Config("Invalid token format".into()))?;
        headers.insert(AUTHORIZATION, value);
    }

    // reqwest is built with rustls-no-provider; Err means already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut builder = reqwest::Client::builder().default_headers(headers);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Join a base URL and a path without doubling slashes.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
