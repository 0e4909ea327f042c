//! Client certificate generation for provider mTLS.
//!
//! Requires the `certs` feature to be enabled.

use std::time::Duration;

use chrono::{Datelike, Utc};
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose, SerialNumber,
};

use crate::error::CertError;
use crate::material::{CertificateMaterial, PUBLIC_KEY_LABEL, relabel_pem};

pub const CERTIFICATE_VALIDITY_DAYS: u64 = 365;

/// Generate a self-signed ECDSA P-256 client certificate for `address`.
///
/// The address becomes the Common Name, which is how the marketplace binds
/// the certificate to the account. Validity starts at midnight UTC today.
pub fn generate_client_certificate(address: &str) -> Result<CertificateMaterial, CertError> {
    if address.is_empty() {
        return Err(CertError::Generation("address is empty".into()));
    }

    let mut params = CertificateParams::default();
    params.distinguished_name.push(DnType::CommonName, address);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params
        .extended_key_usages
        .push(ExtendedKeyUsagePurpose::ClientAuth);
    params.key_usages.push(KeyUsagePurpose::KeyEncipherment);
    params.key_usages.push(KeyUsagePurpose::DataEncipherment);

    let now = Utc::now();
    let today = now.date_naive();
    let month = u8::try_from(today.month()).map_err(|e| CertError::Generation(e.to_string()))?;
    let day = u8::try_from(today.day()).map_err(|e| CertError::Generation(e.to_string()))?;
    params.not_before = rcgen::date_time_ymd(today.year(), month, day);
    params.not_after =
        params.not_before + Duration::from_secs(CERTIFICATE_VALIDITY_DAYS * 24 * 60 * 60);

    let serial = u64::try_from(now.timestamp_micros()).unwrap_or_default();
    params.serial_number = Some(SerialNumber::from(serial));

    let key_pair = KeyPair::generate().map_err(|e| CertError::Generation(e.to_string()))?;
    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| CertError::Generation(e.to_string()))?;

    tracing::debug!(address, "generated client certificate");

    Ok(CertificateMaterial {
        certificate: cert.pem(),
        public_key: relabel_pem(&key_pair.public_key_pem(), PUBLIC_KEY_LABEL),
        private_key: key_pair.serialize_pem(),
    })
}
