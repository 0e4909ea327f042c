//! `leaseflow` CLI Library
//!
//! Command line front-end for leased container deployments: pay and deploy,
//! list with reconciliation, lease status, close, price and certificate.

pub mod args;
pub mod commands;
pub mod fmt;
pub mod overrides;
