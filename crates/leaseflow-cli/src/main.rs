//! `leaseflow` CLI
//!
//! Deploys containers to leased providers: pays through the ledger, follows
//! the authority's push channel and delivers the manifest over mTLS.

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use leaseflow_cli::commands::{self, Command};
use leaseflow_cli::overrides::GlobalArgs;
use leaseflow_core::config::load_config;
use leaseflow_core::tracing_init::init_tracing;
use leaseflow_orchestrator::Dashboard;

#[derive(Parser, Debug)]
#[command(name = "leaseflow")]
#[command(version, about = "Deploy containers to leased providers", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir().ok();
    let mut config = load_config(cli.global.config.as_deref(), cwd.as_deref())
        .context("failed to load configuration")?;
    cli.global.apply(&mut config);

    init_tracing(&config.log_level, cli.global.log_json).context("failed to initialise logging")?;
    info!(version = env!("CARGO_PKG_VERSION"), "Starting leaseflow CLI");
    debug!(
        authority = %config.authority.url,
        relay = %config.relay.url,
        storage = ?config.certificates.storage,
        "resolved configuration"
    );

    let mut dashboard = Dashboard::connect(&config).context("failed to set up clients")?;
    commands::run(cli.command, &mut dashboard).await
}
