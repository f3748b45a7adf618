//! Search keys and related data models

use serde::{Deserialize, Serialize};

/// Favicon hash pair; providers pick whichever form their dialect uses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaviconHash {
    pub md5: String,
    pub mmh3: String,
}

impl FaviconHash {
    pub fn new(md5: impl Into<String>, mmh3: impl Into<String>) -> Self {
        Self {
            md5: md5.into(),
            mmh3: mmh3.into(),
        }
    }

    /// Check if neither hash is set
    pub fn is_empty(&self) -> bool {
        self.md5.is_empty() && self.mmh3.is_empty()
    }
}

/// One key to search for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchKey {
    Ip(String),
    Domain(String),
    Favicon(FaviconHash),
    Cert(String),
}

/// Everything one run searches for.
///
/// Empty lists, and empty entries inside them, are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchKeys {
    pub ip: Vec<String>,
    pub domain: Vec<String>,
    pub icon: Vec<FaviconHash>,
    pub cert: Vec<String>,
}

impl SearchKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an IP
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip.push(ip.into());
        self
    }

    /// Add a domain
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain.push(domain.into());
        self
    }

    /// Add a favicon hash pair
    pub fn with_icon(mut self, icon: FaviconHash) -> Self {
        self.icon.push(icon);
        self
    }

    /// Add a certificate keyword
    pub fn with_cert(mut self, cert: impl Into<String>) -> Self {
        self.cert.push(cert.into());
        self
    }

    /// Non-empty keys in search order: IPs, domains, favicons, certificates
    pub fn keys(&self) -> impl Iterator<Item = SearchKey> + '_ {
        let non_empty = |s: &&String| !s.trim().is_empty();
        let ips = self.ip.iter().filter(non_empty).cloned().map(SearchKey::Ip);
        let domains = self
            .domain
            .iter()
            .filter(non_empty)
            .cloned()
            .map(SearchKey::Domain);
        let icons = self
            .icon
            .iter()
            .filter(|icon| !icon.is_empty())
            .cloned()
            .map(SearchKey::Favicon);
        let certs = self
            .cert
            .iter()
            .filter(non_empty)
            .cloned()
            .map(SearchKey::Cert);

        ips.chain(domains).chain(icons).chain(certs)
    }

    /// Check if there is nothing to search for
    pub fn is_empty(&self) -> bool {
        self.keys().next().is_none()
    }
}
