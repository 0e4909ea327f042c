//! Deployment form flags and their parsers.

use leaseflow_core::deployment::{EnvVar, PortExposure, VolumeMount};
use leaseflow_core::{DeploymentParams, Tier};

/// Flags of `leaseflow deploy`.
#[derive(clap::Args, Debug)]
pub struct DeployArgs {
    /// Deployment name.
    pub name: String,

    /// Container image, e.g. `postgres:16`.
    pub image: String,

    /// Resource tier.
    #[arg(long, default_value = "small")]
    pub tier: Tier,

    /// Command override argument (repeatable).
    #[arg(long = "arg", value_name = "ARG")]
    pub command: Vec<String>,

    /// Environment variable as NAME=VALUE (repeatable).
    #[arg(long = "env", value_name = "NAME=VALUE", value_parser = parse_env_var)]
    pub env_vars: Vec<EnvVar>,

    /// Exposed port as CONTAINER[:HOST][@DOMAIN] (repeatable).
    #[arg(long = "port", value_name = "PORT", value_parser = parse_port)]
    pub ports: Vec<PortExposure>,

    /// Persistent volume mount path.
    #[arg(long)]
    pub volume: Option<String>,
}

impl DeployArgs {
    pub fn into_params(self) -> DeploymentParams {
        DeploymentParams {
            command: self.command,
            env_vars: self.env_vars,
            ports: self.ports,
            volume: self.volume.map(|mount_path| VolumeMount { mount_path }),
            ..DeploymentParams::new(self.name, self.image, self.tier)
        }
    }
}

pub fn parse_env_var(s: &str) -> Result<EnvVar, String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {s:?}"))?;
    if name.is_empty() {
        return Err("environment variable name is empty".to_string());
    }
    Ok(EnvVar {
        name: name.to_string(),
        value: value.to_string(),
    })
}

pub fn parse_port(s: &str) -> Result<PortExposure, String> {
    let (ports, domain) = match s.split_once('@') {
        Some((ports, domain)) if !domain.is_empty() => (ports, Some(domain.to_string())),
        Some(_) => return Err(format!("empty domain in {s:?}")),
        None => (s, None),
    };
    let (container, host) = match ports.split_once(':') {
        Some((container, host)) => (container, Some(host)),
        None => (ports, None),
    };

    let container_port = parse_port_number(container)?;
    let host_port = host.map(parse_port_number).transpose()?;
    Ok(PortExposure {
        container_port,
        host_port,
        domain,
    })
}

fn parse_port_number(s: &str) -> Result<u16, String> {
    match s.parse::<u16>() {
        Ok(0) | Err(_) => Err(format!("invalid port {s:?}")),
        Ok(port) => Ok(port),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn env_var_splits_on_first_equals() {
        let var = parse_env_var("DATABASE_URL=postgres://u:p@db/x?a=b").unwrap();
        assert_eq!(var.name, "DATABASE_URL");
        assert_eq!(var.value, "postgres://u:p@db/x?a=b");
    }

    #[test]
    fn env_var_needs_name() {
        assert!(parse_env_var("=value").is_err());
        assert!(parse_env_var("NOEQUALS").is_err());
    }

    #[test]
    fn port_forms() {
        let plain = parse_port("8080").unwrap();
        assert_eq!(plain.container_port, 8080);
        assert_eq!(plain.host_port, None);
        assert_eq!(plain.domain, None);

        let mapped = parse_port("8080:80").unwrap();
        assert_eq!(mapped.host_port, Some(80));

        let full = parse_port("8080:80@app.example.com").unwrap();
        assert_eq!(full.container_port, 8080);
        assert_eq!(full.host_port, Some(80));
        assert_eq!(full.domain.as_deref(), Some("app.example.com"));
    }

    #[test]
    fn bad_ports_rejected() {
        assert!(parse_port("0").is_err());
        assert!(parse_port("70000").is_err());
        assert!(parse_port("http").is_err());
        assert!(parse_port("80@").is_err());
        assert!(parse_port("80:").is_err());
    }

    #[test]
    fn into_params_keeps_every_field() {
        let args = DeployArgs {
            name: "db".into(),
            image: "postgres:16".into(),
            tier: Tier::Small,
            command: vec!["postgres".into(), "-c".into(), "fsync=off".into()],
            env_vars: vec![parse_env_var("POSTGRES_PASSWORD=secret").unwrap()],
            ports: vec![parse_port("5432").unwrap()],
            volume: Some("/var/lib/postgresql/data".into()),
        };

        let params = args.into_params();
        assert_eq!(params.name, "db");
        assert_eq!(params.command.len(), 3);
        assert_eq!(params.env_vars[0].name, "POSTGRES_PASSWORD");
        assert_eq!(params.ports[0].container_port, 5432);
        assert_eq!(
            params.volume.as_ref().map(|v| v.mount_path.as_str()),
            Some("/var/lib/postgresql/data")
        );
        assert!(params.validate().is_ok());
    }
}
