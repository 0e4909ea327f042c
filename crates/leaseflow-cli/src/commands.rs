//! Subcommands.
//!
//! User-facing output uses writeln! to stdout (this is a CLI binary, not debug output).

use std::io::{self, Write};

use anyhow::Context;
use leaseflow_core::amount::display_icp;
use leaseflow_core::{DeploymentId, DeploymentState, Tier};
use leaseflow_orchestrator::Dashboard;

use crate::args::DeployArgs;
use crate::fmt::{state_summary, write_deployment_detail, write_deployment_table};

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Pay for and roll out a new deployment.
    Deploy(DeployArgs),
    /// List deployments, finishing any an earlier run left half-done.
    List,
    /// Show a deployment and, once active, its lease status from the provider.
    Status {
        /// Deployment ID.
        id: String,
    },
    /// Close a deployment.
    Close {
        /// Deployment ID.
        id: String,
    },
    /// Show the current deployment price and the available tiers.
    Price,
    /// Show (creating if needed) the client certificate used with providers.
    Cert,
}

pub async fn run(command: Command, dashboard: &mut Dashboard) -> anyhow::Result<()> {
    match command {
        Command::Deploy(args) => deploy(dashboard, args).await,
        Command::List => list(dashboard).await,
        Command::Status { id } => status(dashboard, &DeploymentId::new(id)).await,
        Command::Close { id } => close(dashboard, &DeploymentId::new(id)).await,
        Command::Price => price(dashboard).await,
        Command::Cert => cert(dashboard).await,
    }
}

async fn deploy(dashboard: &mut Dashboard, args: DeployArgs) -> anyhow::Result<()> {
    let params = args.into_params();
    let mut progress = io::stdout();
    let mut on_state = |state: &DeploymentState| {
        // Progress output is best effort.
        let _ = writeln!(progress, "  -> {}", state_summary(state));
    };

    let outcome = dashboard
        .deploy(&params, &mut on_state)
        .await
        .context("deployment failed")?;

    let mut out = io::stdout().lock();
    writeln!(out, "Deployment {} is active", outcome.id)?;
    writeln!(
        out,
        "  Paid:     {} (block {})",
        display_icp(outcome.payment.amount_icp(), 6),
        outcome.payment.block_index
    )?;
    if let Some(lease) = outcome.history.lease() {
        writeln!(out, "  Provider: {}", lease.provider_url)?;
    }
    Ok(())
}

async fn list(dashboard: &Dashboard) -> anyhow::Result<()> {
    let deployments = dashboard
        .deployments()
        .await
        .context("failed to load deployments")?;
    write_deployment_table(&mut io::stdout().lock(), &deployments)?;
    Ok(())
}

async fn status(dashboard: &Dashboard, id: &DeploymentId) -> anyhow::Result<()> {
    let deployments = dashboard
        .deployments()
        .await
        .context("failed to load deployments")?;
    let deployment = deployments
        .iter()
        .find(|d| d.id == *id)
        .ok_or_else(|| anyhow::anyhow!("no deployment with id {id}"))?;

    let mut out = io::stdout().lock();
    write_deployment_detail(&mut out, deployment)?;

    if matches!(deployment.current_state(), DeploymentState::Active) {
        let lease = dashboard
            .lease_status(id)
            .await
            .context("failed to query lease status")?;
        writeln!(out, "  Lease:")?;
        writeln!(out, "{}", serde_json::to_string_pretty(&lease)?)?;
    }
    Ok(())
}

async fn close(dashboard: &Dashboard, id: &DeploymentId) -> anyhow::Result<()> {
    let deployments = dashboard
        .close_deployment(id)
        .await
        .with_context(|| format!("failed to close deployment {id}"))?;
    let mut out = io::stdout().lock();
    writeln!(out, "Closed {id}")?;
    write_deployment_table(&mut out, &deployments)?;
    Ok(())
}

async fn price(dashboard: &Dashboard) -> anyhow::Result<()> {
    let quote = dashboard.price().await.context("failed to fetch price")?;
    let mut out = io::stdout().lock();
    writeln!(out, "Price:  {}", display_icp(quote.icp, 6))?;
    writeln!(out, "Quoted: {}", display_icp(quote.quoted_icp, 6))?;
    writeln!(out)?;
    for tier in Tier::ALL {
        let availability = if tier.is_enabled() { "" } else { " (coming soon)" };
        writeln!(
            out,
            "  {:<8} {}{availability}",
            tier.as_str(),
            tier.description()
        )?;
    }
    Ok(())
}

async fn cert(dashboard: &Dashboard) -> anyhow::Result<()> {
    let user = dashboard.ensure_user().await.context("failed to load user")?;
    let material = dashboard
        .certificate()
        .await
        .context("failed to provision client certificate")?;
    let mut out = io::stdout().lock();
    writeln!(out, "Principal: {}", dashboard.identity().principal())?;
    writeln!(out, "Role:      {:?}", user.role)?;
    writeln!(out)?;
    write!(out, "{}", material.certificate)?;
    Ok(())
}
