use std::path::Path;

use anyhow::Context as _;

use crate::catalog::{CatalogOpts, Variant};
use crate::csi::CsiOpts;
use crate::foundation::error::{CarError, CarResult};
use crate::key::KeyFormat;
use crate::storage::{Provenance, StorageOpts};

/// File-level settings for tools built on the crate.
///
/// Every section is optional in JSON; missing sections take their defaults.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage durability and integrity.
    pub storage: StorageOpts,
    /// CSI compression.
    pub csi: CsiOpts,
    /// Settings used when a new container is created.
    pub create: CreateConfig,
    /// Variant assumed when a tool is not told which one to use.
    pub variant: Variant,
}

/// Settings for newly created containers.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CreateConfig {
    /// Maximum attributes per key token; `None` is unlimited.
    pub max_key_attributes: Option<u16>,
    /// Recorded provenance.
    pub provenance: Provenance,
}

impl Config {
    /// Load a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> CarResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| CarError::io(path, e))?;
        let config = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse config '{}'", path.display()))?;
        Ok(config)
    }

    /// Options for opening a catalog.
    pub fn catalog_opts(&self) -> CatalogOpts {
        CatalogOpts {
            storage: self.storage,
            csi: self.csi,
        }
    }

    /// Key format for new containers.
    pub fn key_format(&self) -> KeyFormat {
        match self.create.max_key_attributes {
            Some(max) => KeyFormat::with_max_attributes(max),
            None => KeyFormat::UNLIMITED,
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
