//! FOFA engine implementation
//!
//! Uses the `search/all` API. Queries are sent base64 encoded and rows come
//! back as string arrays in the order of the requested fields.

use super::traits::*;
use crate::config::{Credential, ProviderConfig};
use crate::error::SourceError;
use crate::results::Record;
use crate::search::SearchKey;
use base64::Engine as _;
use serde::Deserialize;
use tracing::warn;

const FIELDS: &str = "ip,port,base_protocol,protocol,domain,host,title,product,lastupdatetime";
const FIELD_COUNT: usize = 9;

/// Default FOFA page size
pub const PAGE_SIZE: u32 = 10000;

/// FOFA asset search
pub struct Fofa {
    endpoint: Endpoint,
}

impl Fofa {
    pub fn new() -> Self {
        Self {
            endpoint: Endpoint::new("https://fofa.info", PAGE_SIZE),
        }
    }
}

impl Default for Fofa {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct FofaResponse {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    errmsg: String,
    #[serde(default)]
    results: Option<Vec<Vec<String>>>,
    /// Total number of matches
    #[serde(default)]
    size: u64,
}

impl Engine for Fofa {
    fn name(&self) -> &str {
        "fofa"
    }

    fn page_size(&self) -> u32 {
        self.endpoint.page_size
    }

    fn init(&mut self, config: &ProviderConfig) {
        self.endpoint.apply(config);
    }

    fn parse_credential(&self, raw: &str) -> Option<Credential> {
        Credential::email_key(raw)
    }

    fn build_query(&self, key: &SearchKey) -> Option<String> {
        let query = match key {
            SearchKey::Ip(ip) => format!(r#"ip="{}""#, ip),
            SearchKey::Domain(domain) => format!(r#"domain="{}""#, domain),
            SearchKey::Favicon(icon) if !icon.mmh3.is_empty() => {
                format!(r#"icon_hash="{}""#, icon.mmh3)
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
        let Credential::EmailKey { email, key } = credential else {
            return Err(SourceError::Credential(
                "fofa expects an email:key pair".to_string(),
            ));
        };

        let qbase64 = base64::engine::general_purpose::STANDARD.encode(query);
        Ok(EngineRequest::get(self.endpoint.url("/api/v1/search/all"))
            .header("Accept", "application/json")
            .param("mail", email.as_str())
            .param("key", key.as_str())
            .param("qbase64", qbase64)
            .param("fields", FIELDS)
            .param("page", cursor.page.to_string())
            .param("size", self.endpoint.page_size.to_string()))
    }

    fn response(&self, response: EngineResponse, query: &str) -> Result<Page, SourceError> {
        let body: FofaResponse = match response.json() {
            Ok(body) => body,
            Err(_) if !response.is_success() => return Err(SourceError::Http(response.status)),
            Err(e) => return Err(e),
        };
        if body.error {
            return Err(SourceError::Api(body.errmsg));
        }

        let rows = body.results.unwrap_or_default();
        let mut records = Vec::with_capacity(rows.len());

        for row in &rows {
            if row.len() < FIELD_COUNT {
                warn!("[fofa] skipping row with {} columns", row.len());
                continue;
            }

            let mut record = Record::new(self.name()).with_prompt(query);
            record.ip = row[0].clone();
            record.port = format!("{}/{}", row[1], row[2]);
            record.protocol = row[3].clone();
            if !row[4].is_empty() {
                record.hosts.push(row[4].clone());
            }
            if row[3].starts_with("http") {
                record.url = row[5].clone();
                record.title = row[6].clone();
            }
            record.fingerprint = row[7].clone();
            record.last_update = row[8].clone();
            records.push(record);
        }

        Ok(Page {
            records,
            returned: rows.len(),
            total: Some(body.size),
        })
    }

    fn next_cursor(&self, cursor: &Cursor, page: &Page) -> Option<Cursor> {
        let total = page.total.unwrap_or_default();
        if total < u64::from(self.endpoint.page_size) || page.returned == 0 {
            return None;
        }
        Some(cursor.advance(page.returned))
    }
}
