//! Configuration module for cmap-rs
//!
//! Handles loading settings and provider credentials from YAML files and
//! environment variables.

mod credentials;
mod settings;

pub use credentials::{Credential, CredentialStore};
pub use settings::*;

use std::path::PathBuf;

/// Settings file name used when nothing else is found
pub const DEFAULT_CONFIG_NAME: &str = "config.yaml";

/// Resolve the settings file location.
///
/// Checks `CMAP_CONFIG`, then `./config.yaml`, then the user config
/// directory. Falls back to `./config.yaml`, where a template gets written.
pub fn locate() -> PathBuf {
    if let Ok(path) = std::env::var("CMAP_CONFIG") {
        return PathBuf::from(path);
    }

    let local = PathBuf::from(DEFAULT_CONFIG_NAME);
    if local.exists() {
        return local;
    }

    if let Some(user) = dirs::config_dir().map(|p| p.join("cmap").join(DEFAULT_CONFIG_NAME)) {
        if user.exists() {
            return user;
        }
    }

    local
}
