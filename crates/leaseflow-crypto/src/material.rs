//! Certificate material as persisted on the authority and locally.

use serde::{Deserialize, Serialize};

use crate::error::CertError;

pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";
pub const PUBLIC_KEY_LABEL: &str = "EC PUBLIC KEY";
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

/// A client certificate with its key pair, all PEM-encoded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMaterial {
    #[serde(rename = "cert")]
    pub certificate: String,
    #[serde(rename = "pub_key")]
    pub public_key: String,
    #[serde(rename = "priv_key")]
    pub private_key: String,
}

// Keep the private key out of logs.
impl std::fmt::Debug for CertificateMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateMaterial")
            .field("certificate_len", &self.certificate.len())
            .field("public_key_len", &self.public_key.len())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl CertificateMaterial {
    /// Check that every part is a PEM block with the expected label.
    pub fn validate(&self) -> Result<(), CertError> {
        check_label("certificate", &self.certificate, CERTIFICATE_LABEL)?;
        check_label("public key", &self.public_key, PUBLIC_KEY_LABEL)?;
        check_label("private key", &self.private_key, PRIVATE_KEY_LABEL)
    }
}

fn check_label(part: &str, pem: &str, label: &str) -> Result<(), CertError> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");
    let trimmed = pem.trim();
    if trimmed.starts_with(&begin) && trimmed.ends_with(&end) {
        Ok(())
    } else {
        Err(CertError::InvalidMaterial(format!(
            "{part} is not a {label} PEM block"
        )))
    }
}

/// Replace the BEGIN/END label of a single PEM block.
pub fn relabel_pem(pem: &str, label: &str) -> String {
    pem.lines()
        .map(|line| {
            if line.starts_with("-----BEGIN ") {
                format!("-----BEGIN {label}-----")
            } else if line.starts_with("-----END ") {
                format!("-----END {label}-----")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}
