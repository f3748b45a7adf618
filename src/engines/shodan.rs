//! Shodan engine implementation
//!
//! Uses the `host/search` API. Pages hold 100 matches.

use super::traits::*;
use crate::config::{Credential, ProviderConfig};
use crate::error::SourceError;
use crate::results::Record;
use crate::search::SearchKey;
use chrono::NaiveDateTime;
use serde::Deserialize;

/// Default Shodan page size
pub const PAGE_SIZE: u32 = 100;

/// Shodan host search
pub struct Shodan {
    endpoint: Endpoint,
}

impl Shodan {
    pub fn new() -> Self {
        Self {
            endpoint: Endpoint::new("https://api.shodan.io", PAGE_SIZE),
        }
    }
}

impl Default for Shodan {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct ShodanResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    total: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    matches: Vec<ShodanMatch>,
}

#[derive(Debug, Deserialize)]
struct ShodanMatch {
    #[serde(default)]
    ip_str: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    port: u32,
    #[serde(default)]
    transport: Option<String>,
    #[serde(default, alias = "hostname", deserialize_with = "null_as_default")]
    hostnames: Vec<String>,
    #[serde(default)]
    product: Option<String>,
    #[serde(default)]
    http: Option<ShodanHttp>,
    #[serde(default)]
    ssl: Option<ShodanSsl>,
    #[serde(default, deserialize_with = "null_as_default")]
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct ShodanHttp {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShodanSsl {
    #[serde(default, deserialize_with = "null_as_default")]
    chain: Vec<String>,
}

/// `2024-03-01T12:34:56.123456` becomes `2024-03-01 12:34:56`; anything else is dropped
fn format_timestamp(raw: &str) -> String {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

impl ShodanMatch {
    fn into_record(self, source: &str, query: &str) -> Option<Record> {
        let ip = self.ip_str.filter(|ip| !ip.is_empty())?;

        let mut record = Record::new(source).with_prompt(query);
        record.ip = ip;
        record.port = format!("{}/{}", self.port, self.transport.unwrap_or_default());
        record.hosts = self.hostnames;

        let http = self
            .http
            .filter(|http| http.host.as_deref().is_some_and(|host| !host.is_empty()));
        if let Some(http) = http {
            record.title = http.title.unwrap_or_default();
            let tls = self.ssl.is_some_and(|ssl| !ssl.chain.is_empty());
            let scheme = if tls { "https" } else { "http" };
            record.protocol = scheme.to_string();
            record.url = format!("{}://{}", scheme, record.ip_port());
        }

        record.fingerprint = self.product.unwrap_or_default();
        record.last_update = format_timestamp(&self.timestamp);
        Some(record)
    }
}

impl Engine for Shodan {
    fn name(&self) -> &str {
        "shodan"
    }

    fn page_size(&self) -> u32 {
        self.endpoint.page_size
    }

    fn init(&mut self, config: &ProviderConfig) {
        self.endpoint.apply(config);
    }

    fn build_query(&self, key: &SearchKey) -> Option<String> {
        let query = match key {
            SearchKey::Ip(ip) => format!(r#"net:"{}""#, ip),
            SearchKey::Domain(domain) => format!(r#"hostname:"{}""#, domain),
            SearchKey::Favicon(icon) if !icon.mmh3.is_empty() => {
                format!(r#"http.favicon.hash:"{}""#, icon.mmh3)
            }
            SearchKey::Favicon(_) => return None,
            SearchKey::Cert(cert) => format!(r#"ssl:"{}""#, cert),
        };
        Some(query)
    }

    fn request(
        &self,
        credential: &Credential,
        query: &str,
        cursor: &Cursor,
    ) -> Result<EngineRequest, SourceError> {
        let key = require_token(self.name(), credential)?;

        Ok(EngineRequest::get(self.endpoint.url("/shodan/host/search"))
            .header("User-Agent", "curl/8.7.1")
            .param("key", key)
            .param("query", query)
            .param("page", cursor.page.to_string()))
    }

    fn response(&self, response: EngineResponse, query: &str) -> Result<Page, SourceError> {
        let body: ShodanResponse = match response.json() {
            Ok(body) => body,
            Err(_) if !response.is_success() => return Err(SourceError::Http(response.status)),
            Err(e) => return Err(e),
        };
        if let Some(error) = body.error {
            return Err(SourceError::Api(error));
        }
        ensure_success(&response)?;

        let returned = body.matches.len();
        let records = body
            .matches
            .into_iter()
            .filter_map(|item| item.into_record(self.name(), query))
            .collect();

        Ok(Page {
            records,
            returned,
            total: Some(body.total),
        })
    }

    fn next_cursor(&self, cursor: &Cursor, page: &Page) -> Option<Cursor> {
        if page.returned < self.endpoint.page_size as usize {
            return None;
        }
        let next = cursor.advance(page.returned);
        if next.fetched >= page.total.unwrap_or_default() {
            return None;
        }
        Some(next)
    }
}
