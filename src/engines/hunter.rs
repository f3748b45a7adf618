//! Hunter engine implementation
//!
//! Uses the Qianxin Hunter open API with URL-safe base64 encoded queries.

use super::traits::*;
use crate::config::{Credential, ProviderConfig};
use crate::error::SourceError;
use crate::results::Record;
use crate::search::SearchKey;
use base64::Engine as _;
use chrono::NaiveDate;
use serde::Deserialize;

/// Default Hunter page size
pub const PAGE_SIZE: u32 = 100;

/// Hunter asset search
pub struct Hunter {
    endpoint: Endpoint,
}

impl Hunter {
    pub fn new() -> Self {
        Self {
            endpoint: Endpoint::new("https://hunter.qianxin.com", PAGE_SIZE),
        }
    }
}

impl Default for Hunter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct HunterResponse {
    code: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    message: String,
    #[serde(default)]
    data: Option<HunterData>,
}

#[derive(Debug, Default, Deserialize)]
struct HunterData {
    #[serde(default, deserialize_with = "null_as_default")]
    total: u64,
    #[serde(default)]
    arr: Option<Vec<HunterItem>>,
}

#[derive(Debug, Deserialize)]
struct HunterItem {
    #[serde(default, deserialize_with = "null_as_default")]
    ip: String,
    #[serde(default, deserialize_with = "null_as_default")]
    port: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    domain: String,
    #[serde(default, deserialize_with = "null_as_default")]
    base_protocol: String,
    #[serde(default, deserialize_with = "null_as_default")]
    protocol: String,
    #[serde(default, deserialize_with = "null_as_default")]
    updated_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    web_title: String,
}

/// `2024-01-02` becomes `2024-01-02 00:00:00`; anything else is dropped
fn format_updated_at(raw: &str) -> String {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

impl Engine for Hunter {
    fn name(&self) -> &str {
        "hunter"
    }

    fn page_size(&self) -> u32 {
        self.endpoint.page_size
    }

    fn init(&mut self, config: &ProviderConfig) {
        self.endpoint.apply(config);
    }

    fn build_query(&self, key: &SearchKey) -> Option<String> {
        let query = match key {
            SearchKey::Ip(ip) => format!(r#"ip="{}""#, ip),
            SearchKey::Domain(domain) => format!(r#"domain.suffix="{}""#, domain),
            SearchKey::Favicon(icon) if !icon.md5.is_empty() => {
                format!(r#"web.icon="{}""#, icon.md5)
            }
            SearchKey::Favicon(_) => return None,
            SearchKey::Cert(cert) => format!(r#"cert="{}""#, cert),
        };
        Some(query)
    }

    fn request(
        &self,
        credential: &Credential,
        query: &str,
        cursor: &Cursor,
    ) -> Result<EngineRequest, SourceError> {
        let api_key = require_token(self.name(), credential)?;
        let search = base64::engine::general_purpose::URL_SAFE.encode(query);

        Ok(EngineRequest::get(self.endpoint.url("/openApi/search"))
            .header("Accept", "application/json")
            .param("api-key", api_key)
            .param("search", search)
            .param("page", cursor.page.to_string())
            .param("page_size", self.endpoint.page_size.to_string()))
    }

    fn response(&self, response: EngineResponse, query: &str) -> Result<Page, SourceError> {
        let body: HunterResponse = match response.json() {
            Ok(body) => body,
            Err(_) if !response.is_success() => return Err(SourceError::Http(response.status)),
            Err(e) => return Err(e),
        };
        if body.code != 200 {
            return Err(SourceError::Api(body.message));
        }

        let data = body.data.unwrap_or_default();
        let items = data.arr.unwrap_or_default();

        let records: Vec<Record> = items
            .iter()
            .map(|item| {
                let mut record = Record::new(self.name()).with_prompt(query);
                record.ip = item.ip.clone();
                record.port = format!("{}/{}", item.port, item.base_protocol);
                record.protocol = item.protocol.clone();
                if !item.domain.is_empty() {
                    record.hosts.push(item.domain.clone());
                }
                record.url = item.url.clone();
                record.title = item.web_title.clone();
                record.last_update = format_updated_at(&item.updated_at);
                record
            })
            .collect();

        Ok(Page {
            records,
            returned: items.len(),
            total: Some(data.total),
        })
    }

    fn next_cursor(&self, cursor: &Cursor, page: &Page) -> Option<Cursor> {
        if page.returned < self.endpoint.page_size as usize || page.total == Some(0) {
            return None;
        }
        Some(cursor.advance(page.returned))
    }
}
