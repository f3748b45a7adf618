//! Engine traits and types

use crate::config::{Credential, ProviderConfig};
use crate::error::SourceError;
use crate::results::Record;
use crate::search::SearchKey;
use std::collections::HashMap;

/// HTTP request to be made by the engine
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// URL to request
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Query parameters
    pub params: Vec<(String, String)>,
    /// Request body
    pub data: Option<RequestBody>,
}

impl EngineRequest {
    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            params: Vec::new(),
            data: None,
        }
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            ..Self::get(url)
        }
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter, keeping insertion order
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add JSON body
    pub fn json(mut self, data: serde_json::Value) -> Self {
        self.data = Some(RequestBody::Json(data));
        self
    }

    /// Look up a query parameter
    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Request body types
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
}

/// HTTP response from engine request
#[derive(Debug)]
pub struct EngineResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub text: String,
    /// Response URL (after redirects)
    pub url: String,
}

impl EngineResponse {
    /// Parse response as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, SourceError> {
        Ok(serde_json::from_str(&self.text)?)
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Position of the next page to fetch for one query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Page number (1-indexed)
    pub page: u32,
    /// Items fetched so far for this query
    pub fetched: u64,
}

impl Cursor {
    pub fn first() -> Self {
        Self {
            page: 1,
            fetched: 0,
        }
    }

    /// Cursor for the page after one that returned `returned` items
    pub fn advance(&self, returned: usize) -> Self {
        Self {
            page: self.page + 1,
            fetched: self.fetched + returned as u64,
        }
    }
}

/// One decoded page of provider results
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Normalized records
    pub records: Vec<Record>,
    /// Items in the raw page, including ones skipped during normalization
    pub returned: usize,
    /// Total matches reported by the provider, if any
    pub total: Option<u64>,
}

/// Base URL and page size of a provider API
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub base_url: String,
    pub page_size: u32,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, page_size: u32) -> Self {
        Self {
            base_url: base_url.into(),
            page_size,
        }
    }

    /// Apply settings overrides
    pub fn apply(&mut self, config: &ProviderConfig) {
        if let Some(ref base_url) = config.base_url {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(page_size) = config.page_size.filter(|size| *size > 0) {
            self.page_size = page_size;
        }
    }

    /// Full URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// A provider API: query dialect, request shape, response schema and
/// stopping rule.
///
/// Pagination itself is driven by [`crate::engines::Source`], identically for
/// every engine.
pub trait Engine: Send + Sync {
    /// Stable provider identifier
    fn name(&self) -> &str;

    /// Items requested per page
    fn page_size(&self) -> u32;

    /// Apply provider settings (called once on startup)
    fn init(&mut self, _config: &ProviderConfig) {}

    /// Parse one raw credential entry from settings
    fn parse_credential(&self, raw: &str) -> Option<Credential> {
        Credential::token(raw)
    }

    /// Provider query string for a key, or `None` when the key does not apply
    fn build_query(&self, key: &SearchKey) -> Option<String>;

    /// Build the HTTP request for one page
    fn request(
        &self,
        credential: &Credential,
        query: &str,
        cursor: &Cursor,
    ) -> Result<EngineRequest, SourceError>;

    /// Decode one page into records
    fn response(&self, response: EngineResponse, query: &str) -> Result<Page, SourceError>;

    /// Cursor of the next page, or `None` when pagination is complete
    fn next_cursor(&self, cursor: &Cursor, page: &Page) -> Option<Cursor>;
}

/// Extract the token of a token credential
pub(crate) fn require_token<'a>(
    engine: &str,
    credential: &'a Credential,
) -> Result<&'a str, SourceError> {
    match credential {
        Credential::Token(token) => Ok(token),
        Credential::EmailKey { .. } => Err(SourceError::Credential(format!(
            "{} expects an API token",
            engine
        ))),
    }
}

/// Deserialize an explicit `null` as the type's default
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    Ok(<Option<T> as serde::Deserialize>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fail with the HTTP status unless the response is 2xx
pub(crate) fn ensure_success(response: &EngineResponse) -> Result<(), SourceError> {
    if response.is_success() {
        Ok(())
    } else {
        Err(SourceError::Http(response.status))
    }
}
