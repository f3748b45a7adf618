//! Provider credentials and random selection

use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::fmt;

/// A secret used to authenticate against one provider
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Single API token
    Token(String),
    /// Account email paired with an API key
    EmailKey { email: String, key: String },
}

impl Credential {
    /// Parse an `email:key` pair, splitting on the first colon
    pub fn email_key(raw: &str) -> Option<Self> {
        let (email, key) = raw.trim().split_once(':')?;
        if email.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self::EmailKey {
            email: email.to_string(),
            key: key.to_string(),
        })
    }

    /// Parse a plain token
    pub fn token(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        (!raw.is_empty()).then(|| Self::Token(raw.to_string()))
    }
}

// Secrets never reach logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(_) => f.write_str("Token(***)"),
            Self::EmailKey { email, .. } => write!(f, "EmailKey({}, ***)", email),
        }
    }
}

/// Raw credential entries per provider name
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    entries: HashMap<String, Vec<String>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add raw entries for a provider
    pub fn extend(&mut self, provider: &str, entries: impl IntoIterator<Item = String>) {
        self.entries
            .entry(provider.to_string())
            .or_default()
            .extend(entries);
    }

    /// Add one raw entry for a provider
    pub fn insert(&mut self, provider: &str, entry: impl Into<String>) {
        self.extend(provider, [entry.into()]);
    }

    /// Raw entries configured for a provider
    pub fn entries(&self, provider: &str) -> &[String] {
        self.entries
            .get(provider)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Pick one credential at random among the entries `parse` accepts
    pub fn random<F>(&self, provider: &str, parse: F) -> Option<Credential>
    where
        F: Fn(&str) -> Option<Credential>,
    {
        let candidates: Vec<Credential> = self
            .entries(provider)
            .iter()
            .filter_map(|raw| parse(raw))
            .collect();
        candidates.choose(&mut rand::thread_rng()).cloned()
    }

    /// Check whether no provider has any entry
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_key_splits_on_first_colon() {
        let cred = Credential::email_key("me@example.com:abc:def").unwrap();
        assert_eq!(
            cred,
            Credential::EmailKey {
                email: "me@example.com".to_string(),
                key: "abc:def".to_string(),
            }
        );
        assert!(Credential::email_key("no-colon").is_none());
        assert!(Credential::email_key(":key").is_none());
    }

    #[test]
    fn test_random_selects_from_parsed_entries() {
        let mut store = CredentialStore::new();
        store.insert("fofa", "broken");
        store.insert("fofa", "me@example.com:key");

        for _ in 0..10 {
            let cred = store.random("fofa", Credential::email_key).unwrap();
            assert!(matches!(cred, Credential::EmailKey { .. }));
        }
    }

    #[test]
    fn test_random_missing_provider() {
        let store = CredentialStore::new();
        assert!(store.random("shodan", Credential::token).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_debug_hides_secret() {
        let cred = Credential::token("super-secret").unwrap();
        assert!(!format!("{:?}", cred).contains("super-secret"));
    }
}
