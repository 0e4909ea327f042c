//! Output formatting helpers.

use std::io::{self, Write};

use leaseflow_core::amount::display_icp;
use leaseflow_core::deployment::to_utc;
use leaseflow_core::{Deployment, DeploymentState, TimestampNs};

fn timestamp(at: TimestampNs) -> String {
    to_utc(at).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// One-line description of a state, with the failure reason if any.
pub fn state_summary(state: &DeploymentState) -> String {
    match state.failure_reason() {
        Some(reason) => format!("{} ({reason})", state.name()),
        None => state.name().to_string(),
    }
}

pub fn write_deployment_table(w: &mut impl Write, deployments: &[Deployment]) -> io::Result<()> {
    if deployments.is_empty() {
        writeln!(w, "No deployments")?;
        return Ok(());
    }
    writeln!(
        w,
        "{:<24} {:<20} {:<8} {:<20} {:<17}",
        "ID", "NAME", "TIER", "STATE", "CREATED"
    )?;
    for d in deployments {
        writeln!(
            w,
            "{:<24} {:<20} {:<8} {:<20} {:<17}",
            d.id.as_str(),
            d.params.name,
            d.params.tier.as_str(),
            d.current_state().name(),
            to_utc(d.created_at()).format("%Y-%m-%d %H:%M")
        )?;
    }
    Ok(())
}

pub fn write_deployment_detail(w: &mut impl Write, d: &Deployment) -> io::Result<()> {
    writeln!(w, "  ID:       {}", d.id)?;
    writeln!(w, "  Name:     {}", d.params.name)?;
    writeln!(w, "  Image:    {}", d.params.image)?;
    writeln!(w, "  Tier:     {} ({})", d.params.tier, d.params.tier.description())?;
    writeln!(w, "  Price:    {}", display_icp(d.icp_price, 6))?;
    writeln!(w, "  State:    {}", state_summary(d.current_state()))?;
    if let Some(created) = d.state_history.deployment_created() {
        writeln!(w, "  DSEQ:     {}", created.dseq)?;
    }
    if let Some(lease) = d.state_history.lease() {
        writeln!(w, "  Provider: {}", lease.provider_url)?;
    }
    writeln!(w, "  History:")?;
    for (at, state) in d.state_history.entries() {
        writeln!(w, "    {}  {}", timestamp(*at), state_summary(state))?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use leaseflow_core::{DeploymentParams, StateHistory, Tier};

    use super::*;

    fn sample() -> Deployment {
        let mut history = StateHistory::new(1_700_000_000_000_000_000);
        history
            .append(
                1_700_000_060_000_000_000,
                DeploymentState::failed_on_client("provider unreachable"),
            )
            .unwrap();
        Deployment {
            id: "dep-1".into(),
            owner: "alice".into(),
            params: DeploymentParams::new("db", "postgres:16", Tier::Small),
            icp_price: 10.5,
            state_history: history,
        }
    }

    #[test]
    fn empty_table() {
        let mut out = Vec::new();
        write_deployment_table(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No deployments\n");
    }

    #[test]
    fn table_row_per_deployment() {
        let mut out = Vec::new();
        write_deployment_table(&mut out, &[sample()]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("dep-1"));
        assert!(lines[1].contains("FailedOnClient"));
        assert!(lines[1].contains("2023-11-14 22:13"));
    }

    #[test]
    fn detail_lists_history_with_reasons() {
        let mut out = Vec::new();
        write_deployment_detail(&mut out, &sample()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Price:    10.50 ICP"));
        assert!(text.contains("2023-11-14 22:13:20  Initialized"));
        assert!(text.contains("2023-11-14 22:14:20  FailedOnClient (provider unreachable)"));
        assert!(!text.contains("DSEQ"));
    }
}
