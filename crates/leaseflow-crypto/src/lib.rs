//! `leaseflow` Certificate Library
//!
//! Client certificate material used to authenticate against providers
//! over mutual TLS.
//!
//! - **Material**: PEM certificate, PEM EC public key, PEM PKCS8 private key
//! - **Generation**: ECDSA P-256, self-signed, `CN=<address>`, `clientAuth`
//!   (requires the `certs` feature)
//! - **Store**: owner-only JSON file keyed by principal

pub mod error;
pub mod material;
pub mod store;

#[cfg(feature = "certs")]
pub mod certs;

#[cfg(feature = "certs")]
pub use certs::{CERTIFICATE_VALIDITY_DAYS, generate_client_certificate};
pub use error::CertError;
pub use material::CertificateMaterial;
pub use store::CertificateStore;
