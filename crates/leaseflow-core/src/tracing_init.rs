//! Tracing setup for the `leaseflow` binaries.
//!
//! Logs always go to stderr; stdout carries user-facing output only.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Error, Result};

/// Filter from `RUST_LOG`, or `default_filter` when the variable is unset
/// or unparsable.
///
/// A bare level such as `"info"` is scoped to the `leaseflow` crates so
/// dependency chatter (hyper, rustls) stays at `warn`.
pub fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(scoped(default_filter)))
}

fn scoped(filter: &str) -> String {
    if filter.contains('=') || filter.contains(',') {
        return filter.to_string();
    }
    ["leaseflow_core", "leaseflow_crypto", "leaseflow_orchestrator", "leaseflow_cli", "leaseflow"]
        .iter()
        .fold("warn".to_string(), |acc, target| format!("{acc},{target}={filter}"))
}

/// Install the global subscriber, JSON lines when `log_json` is set.
pub fn init_tracing(default_filter: &str, log_json: bool) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(default_filter));
    let installed = if log_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    installed.map_err(|e| Error::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_is_scoped_to_own_crates() {
        let filter = scoped("debug");
        assert!(filter.starts_with("warn,"));
        assert!(filter.contains("leaseflow_orchestrator=debug"));
        assert!(filter.contains("leaseflow_cli=debug"));
    }

    #[test]
    fn directives_pass_through() {
        assert_eq!(scoped("leaseflow_orchestrator=trace"), "leaseflow_orchestrator=trace");
        assert_eq!(scoped("info,hyper=debug"), "info,hyper=debug");
    }
}
