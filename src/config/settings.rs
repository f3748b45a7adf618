//! Settings structures for cmap-rs configuration

use super::credentials::CredentialStore;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{info, warn};

/// Template written when no settings file exists yet
pub const DEFAULT_CONFIG_FILE: &str = r#"auth:
  fofa:
    # - example@gmail.com:8ccxxcccxxxccxxxxcccccxxxccccddd
  hunter:
    # - 8ccxxcccxxxccxxxxcccccxxxccccddd9ccxxcccxxxccxxxxcccccxxxccccddd
  quake:
    # - 12345678-abcd-efgh-ijkl-123456789012
  shodan:
    # - 8ccxxcDExxxccxxxxcccFGxxxccccddd
"#;

/// Main settings structure matching config.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Raw credentials per provider name
    pub auth: AuthSettings,
    pub network: NetworkSettings,
    pub search: SearchSettings,
    /// Per-provider overrides keyed by provider name
    pub providers: HashMap<String, ProviderConfig>,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Self = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values no run can work with
    pub fn validate(&self) -> Result<()> {
        if self.search.channel_buffer == 0 {
            return Err(Error::Config("search.channel_buffer must be positive".to_string()));
        }
        if self.search.query_deadline == 0 {
            return Err(Error::Config("search.query_deadline must be positive".to_string()));
        }
        for (name, config) in &self.providers {
            if config.page_size == Some(0) {
                return Err(Error::Config(format!("providers.{}.page_size must be positive", name)));
            }
        }
        Ok(())
    }

    /// Load settings, writing the credential template first if the file is missing.
    ///
    /// Returns the settings and whether the template was just created.
    pub fn load_or_init<P: AsRef<Path>>(path: P) -> Result<(Self, bool)> {
        let path = path.as_ref();
        let created = if path.exists() {
            false
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, DEFAULT_CONFIG_FILE)?;
            info!("Created settings template at {}", path.display());
            true
        };

        info!("Loading settings from: {}", path.display());
        let settings = Self::from_file(path)?;
        Ok((settings, created))
    }

    /// Merge with environment variables (CMAP_* prefix)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("CMAP_TIMEOUT") {
            if let Ok(timeout) = val.parse() {
                self.network.request_timeout = timeout;
            }
        }
        if let Ok(val) = std::env::var("CMAP_RATE_LIMIT") {
            if let Ok(requests) = val.parse() {
                self.network.rate_limit.requests = requests;
            }
        }
        if let Ok(val) = std::env::var("CMAP_PROXY") {
            self.network.proxy = Some(val);
        }
        if let Ok(val) = std::env::var("CMAP_QUERY_DEADLINE") {
            if let Ok(secs) = val.parse() {
                self.search.query_deadline = secs;
            }
        }
    }

    /// Get provider overrides by name
    pub fn provider(&self, name: &str) -> ProviderConfig {
        self.providers.get(name).cloned().unwrap_or_default()
    }

    /// Build the credential store from the `auth` section
    pub fn credentials(&self) -> CredentialStore {
        let mut store = CredentialStore::new();
        for (provider, entries) in self.auth.iter() {
            if entries.is_empty() {
                warn!("No credentials configured for {}", provider);
            }
            store.extend(provider, entries.iter().cloned());
        }
        store
    }
}

/// Raw credential lists per provider.
///
/// A provider listed with only commented-out entries parses as null and is
/// treated as an empty list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Option<Vec<String>>>")]
pub struct AuthSettings(BTreeMap<String, Vec<String>>);

impl From<BTreeMap<String, Option<Vec<String>>>> for AuthSettings {
    fn from(raw: BTreeMap<String, Option<Vec<String>>>) -> Self {
        Self(
            raw.into_iter()
                .map(|(name, entries)| (name, entries.unwrap_or_default()))
                .collect(),
        )
    }
}

impl AuthSettings {
    /// Entries configured for a provider
    pub fn get(&self, provider: &str) -> &[String] {
        self.0.get(provider).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Request timeout in seconds
    pub request_timeout: u64,
    /// Verify TLS certificates
    pub verify_ssl: bool,
    /// Proxy URL applied to every request
    pub proxy: Option<String>,
    /// Global request ceiling shared by all providers
    pub rate_limit: RateLimitSettings,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            request_timeout: crate::DEFAULT_TIMEOUT,
            verify_ssl: true,
            proxy: None,
            rate_limit: RateLimitSettings::default(),
        }
    }
}

/// Requests allowed per window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Requests per window
    pub requests: u32,
    /// Window length in seconds
    pub per_seconds: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests: crate::DEFAULT_RATE_LIMIT,
            per_seconds: crate::DEFAULT_RATE_LIMIT_PERIOD,
        }
    }
}

/// Run behavior settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Providers queried when none are given on the command line
    pub providers: Vec<String>,
    /// Capacity of the delivery channel
    pub channel_buffer: usize,
    /// Wall-clock ceiling for one provider invocation in seconds
    pub query_deadline: u64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            providers: vec![
                "fofa".to_string(),
                "quake".to_string(),
                "hunter".to_string(),
                "shodan".to_string(),
            ],
            channel_buffer: crate::DEFAULT_CHANNEL_BUFFER,
            query_deadline: crate::DEFAULT_QUERY_DEADLINE,
        }
    }
}

/// Individual provider overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Whether the provider is disabled
    pub disabled: bool,
    /// API base URL (scheme and host)
    pub base_url: Option<String>,
    /// Items requested per page
    pub page_size: Option<u32>,
    /// Provider-specific request ceiling replacing the global one
    pub rate_limit: Option<RateLimitSettings>,
}
