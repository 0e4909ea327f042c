//! `leaseflow` Core Library
//!
//! Shared functionality for `leaseflow` components:
//! - Deployment model and append-only state history
//! - Deployment parameters, resource tiers and validation
//! - Authority result shape and push message parsing
//! - Configuration resolution and hierarchy
//! - Common error types

pub mod amount;
pub mod api;
pub mod config;
pub mod deployment;
pub mod error;
pub mod push;
pub mod tracing_init;

pub use api::ApiError;
pub use config::Config;
pub use deployment::{
    Deployment, DeploymentId, DeploymentParams, DeploymentState, StateHistory, Tier, TimestampNs,
};
pub use error::{Error, Result};
pub use push::PushMessage;
