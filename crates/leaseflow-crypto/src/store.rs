//! Local certificate store.
//!
//! A JSON file mapping principals to their certificate material, written
//! with owner-only permissions since it holds private keys.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CertError;
use crate::material::CertificateMaterial;

pub const STORE_FILE_NAME: &str = "certificates.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    certificates: HashMap<String, CertificateMaterial>,
}

/// Certificate material persisted under a directory.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    path: PathBuf,
}

impl CertificateStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(STORE_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the certificate for `principal`, if one was saved.
    pub fn load(&self, principal: &str) -> Result<Option<CertificateMaterial>, CertError> {
        Ok(self.read()?.certificates.remove(principal))
    }

    /// Save (or replace) the certificate for `principal`.
    pub fn save(&self, principal: &str, material: &CertificateMaterial) -> Result<(), CertError> {
        material.validate()?;
        let mut file = self.read()?;
        file.certificates
            .insert(principal.to_string(), material.clone());
        self.write(&file)?;
        tracing::debug!(path = %self.path.display(), principal, "saved certificate");
        Ok(())
    }

    fn read(&self) -> Result<StoreFile, CertError> {
        if !self.path.exists() {
            return Ok(StoreFile::default());
        }
        let data = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&data).map_err(|e| {
            CertError::Serialization(format!("Failed to parse certificate store: {e}"))
        })
    }

    fn write(&self, file: &StoreFile) -> Result<(), CertError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(file).map_err(|e| {
            CertError::Serialization(format!("Failed to serialize certificate store: {e}"))
        })?;
        std::fs::write(&self.path, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }
}
