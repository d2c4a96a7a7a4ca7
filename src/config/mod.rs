use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::ledger::{Sats, VaultLedger, DEFAULT_VAULT_BALANCE, DEFAULT_VAULT_LABEL};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid vault settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Opening state of a vault, e.g. `{"label": "Main Vault", "balance": 1500000}`.
/// Missing fields fall back to the defaults.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VaultSettings {
    pub label: String,
    pub balance: Sats,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            label: DEFAULT_VAULT_LABEL.to_string(),
            balance: DEFAULT_VAULT_BALANCE,
        }
    }
}

impl VaultSettings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn into_ledger(self) -> VaultLedger {
        VaultLedger::new(self.label, self.balance)
    }
}
