//! Per-mode secrets file (`secrets/<mode>.toml`).
//!
//! Kept apart from the main configuration so the latter can be committed
//! and shared. A missing file is an error only when the caller actually
//! needs credentials for the selected mode.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecretConfig {
    pub api: SecretApi,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecretApi {
    pub upbit: VenueSecrets,
    pub bitget: VenueSecrets,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VenueSecrets {
    pub access_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

/// Load credentials from a separate file. Fail fast if it is unreadable.
pub fn load_secret_config(path: &Path) -> Result<SecretConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read secret config: {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parse secret config: {}", path.display()))
}

/// Merge file-sourced credentials into the runtime config, without
/// clobbering values that are already set (environment overrides ran
/// first and win).
pub fn apply(cfg: &mut crate::config::Config, secrets: &SecretConfig) {
    let slots = [
        (&mut cfg.api.upbit.access_key, &secrets.api.upbit.access_key),
        (&mut cfg.api.upbit.secret_key, &secrets.api.upbit.secret_key),
        (&mut cfg.api.bitget.access_key, &secrets.api.bitget.access_key),
        (&mut cfg.api.bitget.secret_key, &secrets.api.bitget.secret_key),
        (&mut cfg.api.bitget.passphrase, &secrets.api.bitget.passphrase),
    ];
    for (slot, value) in slots {
        if slot.is_empty() && !value.is_empty() {
            *slot = value.clone();
        }
    }
}
