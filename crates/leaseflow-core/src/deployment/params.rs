//! Deployment request parameters and resource tiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const NAME_LEN: std::ops::RangeInclusive<usize> = 2..=100;
pub const IMAGE_LEN: std::ops::RangeInclusive<usize> = 2..=100;
pub const MAX_COMMAND_ARGS: usize = 30;
pub const MAX_ENV_VARS: usize = 20;
pub const MAX_PORTS: usize = 5;
/// Upper bound for a command argument, env name/value or mount path.
pub const MAX_FIELD_LEN: usize = 50;

/// Compute size offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Small,
    Medium,
    Large,
}

/// Resources reserved by a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierResources {
    pub cpu_millis: u32,
    pub memory_mib: u32,
    pub storage_mib: u32,
}

impl Tier {
    pub const ALL: [Self; 3] = [Self::Small, Self::Medium, Self::Large];

    pub const fn resources(self) -> TierResources {
        match self {
            Self::Small => TierResources {
                cpu_millis: 500,
                memory_mib: 512,
                storage_mib: 512,
            },
            Self::Medium => TierResources {
                cpu_millis: 1000,
                memory_mib: 1024,
                storage_mib: 5 * 1024,
            },
            Self::Large => TierResources {
                cpu_millis: 2000,
                memory_mib: 2 * 1024,
                storage_mib: 10 * 1024,
            },
        }
    }

    /// Only the small tier is currently offered by providers.
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Small)
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Small => "0.5 vCPU | 0.5 GB RAM | 500 MB Storage",
            Self::Medium => "1 vCPU | 1 GB RAM | 5 GB Storage",
            Self::Large => "2 vCPU | 2 GB RAM | 10 GB Storage",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(Self::Small),
            "medium" => Ok(Self::Medium),
            "large" => Ok(Self::Large),
            other => Err(Error::Validation(format!("unknown tier: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// A container port exposed to the outside world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortExposure {
    pub container_port: u16,
    /// Port the provider exposes; defaults to the container port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    /// Domain accepted in front of the exposed port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub mount_path: String,
}

/// Immutable request payload submitted with `create_deployment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentParams {
    pub name: String,
    pub image: String,
    pub tier: Tier,
    /// Command override; empty keeps the image entrypoint.
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub env_vars: Vec<EnvVar>,
    #[serde(default)]
    pub ports: Vec<PortExposure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeMount>,
}

impl DeploymentParams {
    pub fn new(name: impl Into<String>, image: impl Into<String>, tier: Tier) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            tier,
            command: Vec::new(),
            env_vars: Vec::new(),
            ports: Vec::new(),
            volume: None,
        }
    }

    /// Check the request against the limits the dashboard enforces.
    pub fn validate(&self) -> Result<()> {
        check_len("name", &self.name, &NAME_LEN)?;
        check_len("image", &self.image, &IMAGE_LEN)?;

        if !self.tier.is_enabled() {
            return Err(Error::Validation(format!(
                "tier {} is not available yet",
                self.tier
            )));
        }

        if self.command.len() > MAX_COMMAND_ARGS {
            return Err(Error::Validation(format!(
                "at most {MAX_COMMAND_ARGS} command arguments allowed"
            )));
        }
        for arg in &self.command {
            check_max("command argument", arg)?;
        }

        if self.env_vars.len() > MAX_ENV_VARS {
            return Err(Error::Validation(format!(
                "at most {MAX_ENV_VARS} environment variables allowed"
            )));
        }
        for var in &self.env_vars {
            if var.name.is_empty() {
                return Err(Error::Validation(
                    "environment variable name is empty".into(),
                ));
            }
            check_max("environment variable name", &var.name)?;
            check_max("environment variable value", &var.value)?;
        }

        if self.ports.len() > MAX_PORTS {
            return Err(Error::Validation(format!(
                "at most {MAX_PORTS} exposed ports allowed"
            )));
        }
        for port in &self.ports {
            if port.container_port == 0 || port.host_port == Some(0) {
                return Err(Error::Validation(
                    "ports must be between 1 and 65535".into(),
                ));
            }
        }

        if let Some(volume) = &self.volume {
            check_max("volume mount path", &volume.mount_path)?;
        }

        Ok(())
    }
}

fn check_len(field: &str, value: &str, range: &std::ops::RangeInclusive<usize>) -> Result<()> {
    let len = value.chars().count();
    if range.contains(&len) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "{field} must be {}..={} characters, got {len}",
            range.start(),
            range.end()
        )))
    }
}

fn check_max(field: &str, value: &str) -> Result<()> {
    if value.chars().count() > MAX_FIELD_LEN {
        return Err(Error::Validation(format!(
            "{field} exceeds {MAX_FIELD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn postgres() -> DeploymentParams {
        DeploymentParams::new("db", "postgres:16", Tier::Small)
    }

    #[test]
    fn minimal_params_are_valid() {
        postgres().validate().unwrap();
    }

    #[test]
    fn short_name_rejected() {
        let mut params = postgres();
        params.name = "x".into();
        assert!(matches!(params.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn disabled_tier_rejected() {
        let mut params = postgres();
        params.tier = Tier::Large;
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("large"));
    }

    #[test]
    fn too_many_ports_rejected() {
        let mut params = postgres();
        params.ports = (1..=6)
            .map(|p| PortExposure {
                container_port: 8000 + p,
                host_port: None,
                domain: None,
            })
            .collect();
        assert!(params.validate().is_err());
    }

    #[test]
    fn zero_port_rejected() {
        let mut params = postgres();
        params.ports.push(PortExposure {
            container_port: 0,
            host_port: None,
            domain: None,
        });
        assert!(params.validate().is_err());
    }

    #[test]
    fn long_env_value_rejected() {
        let mut params = postgres();
        params.env_vars.push(EnvVar {
            name: "POSTGRES_PASSWORD".into(),
            value: "x".repeat(51),
        });
        assert!(params.validate().is_err());
    }

    #[test]
    fn tier_parses_case_insensitively() {
        assert_eq!("Small".parse::<Tier>().unwrap(), Tier::Small);
        assert!("huge".parse::<Tier>().is_err());
    }

    #[test]
    fn tier_resources_grow() {
        let small = Tier::Small.resources();
        let large = Tier::Large.resources();
        assert_eq!(small.cpu_millis, 500);
        assert!(large.memory_mib > small.memory_mib);
    }
}
