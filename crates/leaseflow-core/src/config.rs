//! Configuration resolution for leaseflow.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/leaseflow/settings.json), or an explicit file
//! 3. Project config (.leaseflow/settings.json)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Complete leaseflow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub authority: AuthorityConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub manifest: ManifestConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub certificates: CertificateConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            authority: AuthorityConfig::default(),
            ledger: LedgerConfig::default(),
            relay: RelayConfig::default(),
            manifest: ManifestConfig::default(),
            pricing: PricingConfig::default(),
            certificates: CertificateConfig::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where the deployment authority lives and who we are to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityConfig {
    pub url: String,
    /// NDJSON push endpoint; defaults to `<url>/push`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Principal the access token was issued to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<String>,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:4943".to_string(),
            push_url: None,
            access_token: None,
            principal: None,
        }
    }
}

impl AuthorityConfig {
    pub fn push_url(&self) -> String {
        self.push_url
            .clone()
            .unwrap_or_else(|| format!("{}/push", self.url.trim_end_matches('/')))
    }
}

/// Ledger gateway used for payments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub url: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:4944".to_string(),
        }
    }
}

/// HTTP relay that performs mTLS calls to providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    pub url: String,
    /// Socket timeout handed to the relay for the provider call.
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8080/proxy".to_string(),
            timeout_secs: 60,
        }
    }
}

impl RelayConfig {
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Manifest delivery retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Wait before the first attempt so the lease can propagate.
    pub initial_grace_secs: u64,
    /// Fixed delay between attempts.
    pub retry_delay_secs: u64,
    pub max_attempts: u32,
    /// Provider error text that marks the lease as not yet visible.
    pub lease_missing_marker: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            initial_grace_secs: 5,
            retry_delay_secs: 6,
            max_attempts: 3,
            lease_missing_marker: "no lease for deployment".to_string(),
        }
    }
}

impl ManifestConfig {
    pub const fn initial_grace(&self) -> Duration {
        Duration::from_secs(self.initial_grace_secs)
    }

    pub const fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Price quote handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub refresh_interval_secs: u64,
    /// Safety markup on top of the quote, in percent.
    pub markup_percent: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30,
            markup_percent: 1.0,
        }
    }
}

impl PricingConfig {
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

/// Where the mTLS client certificate is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStorageMode {
    /// On the authority's user record (survives across devices).
    #[default]
    Authority,
    /// In a local file only.
    Local,
    /// Both; the local copy is consulted first.
    Both,
}

impl std::str::FromStr for CertificateStorageMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "authority" => Ok(Self::Authority),
            "local" => Ok(Self::Local),
            "both" => Ok(Self::Both),
            other => Err(Error::Config(format!(
                "unknown certificate storage mode: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificateConfig {
    #[serde(default)]
    pub storage: CertificateStorageMode,
    /// Directory of the local certificate store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// Load configuration with hierarchical resolution.
///
/// `explicit` replaces the global config file when given.
pub fn load_config(explicit: Option<&Path>, project_dir: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(path) = explicit {
        let file = load_config_file(path)?;
        merge_config(&mut config, file);
    } else if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        let global = load_config_file(&global_path)?;
        merge_config(&mut config, global);
    }

    if let Some(dir) = project_dir {
        let project_path = dir.join(".leaseflow").join("settings.json");
        if project_path.exists() {
            let project = load_config_file(&project_path)?;
            merge_config(&mut config, project);
        }
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("leaseflow").join("settings.json"))
}

/// Default directory of the local certificate store (`~/.leaseflow/certs`).
pub fn default_certs_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".leaseflow").join("certs"))
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let config = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

fn merge_config(base: &mut Config, overlay: Config) {
    // Authority: optional credentials only override when present
    base.authority.url = overlay.authority.url;
    if overlay.authority.push_url.is_some() {
        base.authority.push_url = overlay.authority.push_url;
    }
    if overlay.authority.access_token.is_some() {
        base.authority.access_token = overlay.authority.access_token;
    }
    if overlay.authority.principal.is_some() {
        base.authority.principal = overlay.authority.principal;
    }

    base.ledger = overlay.ledger;
    base.relay = overlay.relay;
    base.manifest = overlay.manifest;
    base.pricing = overlay.pricing;

    base.certificates.storage = overlay.certificates.storage;
    if overlay.certificates.dir.is_some() {
        base.certificates.dir = overlay.certificates.dir;
    }

    base.log_level = overlay.log_level;
}

/// Apply `LEASEFLOW_*` overrides read through `lookup`.
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("LEASEFLOW_AUTHORITY_URL") {
        config.authority.url = val;
    }
    if let Some(val) = lookup("LEASEFLOW_PUSH_URL") {
        config.authority.push_url = Some(val);
    }
    if let Some(val) = lookup("LEASEFLOW_ACCESS_TOKEN") {
        config.authority.access_token = Some(val);
    }
    if let Some(val) = lookup("LEASEFLOW_PRINCIPAL") {
        config.authority.principal = Some(val);
    }
    if let Some(val) = lookup("LEASEFLOW_LEDGER_URL") {
        config.ledger.url = val;
    }
    if let Some(val) = lookup("LEASEFLOW_RELAY_URL") {
        config.relay.url = val;
    }
    if let Some(val) = lookup("LEASEFLOW_RELAY_TIMEOUT_SECS")
        && let Ok(n) = val.parse()
    {
        config.relay.timeout_secs = n;
    }
    if let Some(val) = lookup("LEASEFLOW_CERT_STORAGE")
        && let Ok(mode) = val.parse()
    {
        config.certificates.storage = mode;
    }
    if let Some(val) = lookup("LEASEFLOW_LOG_LEVEL") {
        config.log_level = val;
    }
}
