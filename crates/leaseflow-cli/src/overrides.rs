//! Global flags and their config overrides.
//!
//! Flags are the highest layer of the configuration hierarchy and are
//! applied after files and `LEASEFLOW_*` variables.

use std::path::PathBuf;

use leaseflow_core::Config;
use leaseflow_core::config::CertificateStorageMode;

#[derive(clap::Args, Debug, Default)]
pub struct GlobalArgs {
    /// Config file to load instead of the global settings file.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Deployment authority gateway URL.
    #[arg(long, global = true)]
    pub authority_url: Option<String>,

    /// Bearer token for the authority and ledger.
    #[arg(long, global = true)]
    pub access_token: Option<String>,

    /// Caller principal.
    #[arg(long, global = true)]
    pub principal: Option<String>,

    /// mTLS relay URL.
    #[arg(long, global = true)]
    pub relay_url: Option<String>,

    /// Where the client certificate is kept.
    #[arg(long, global = true, value_name = "MODE")]
    pub cert_storage: Option<CertificateStorageMode>,

    /// Local certificate store directory.
    #[arg(long, global = true, value_name = "DIR")]
    pub cert_dir: Option<PathBuf>,

    /// Log level filter, e.g. `debug` or `leaseflow_orchestrator=trace`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,
}

impl GlobalArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.authority_url {
            config.authority.url.clone_from(url);
        }
        if let Some(token) = &self.access_token {
            config.authority.access_token = Some(token.clone());
        }
        if let Some(principal) = &self.principal {
            config.authority.principal = Some(principal.clone());
        }
        if let Some(url) = &self.relay_url {
            config.relay.url.clone_from(url);
        }
        if let Some(mode) = self.cert_storage {
            config.certificates.storage = mode;
        }
        if let Some(dir) = &self.cert_dir {
            config.certificates.dir = Some(dir.clone());
        }
        if let Some(level) = &self.log_level {
            config.log_level.clone_from(level);
        }
    }
}
