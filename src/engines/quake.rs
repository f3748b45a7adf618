//! Quake engine implementation
//!
//! Uses the 360 Quake service search API, which takes a JSON body and pages
//! by start offset.

use super::traits::*;
use crate::config::{Credential, ProviderConfig};
use crate::error::SourceError;
use crate::results::Record;
use crate::search::SearchKey;
use serde::Deserialize;

/// Default Quake page size
pub const PAGE_SIZE: u32 = 500;

const INCLUDE: [&str; 7] = [
    "ip",
    "port",
    "hostname",
    "transport",
    "service.name",
    "service.http.host",
    "service.http.title",
];

/// Quake asset search
pub struct Quake {
    endpoint: Endpoint,
}

impl Quake {
    pub fn new() -> Self {
        Self {
            endpoint: Endpoint::new("https://quake.360.net", PAGE_SIZE),
        }
    }
}

impl Default for Quake {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct QuakeResponse {
    /// Numeric 0 on success, a number or string error code otherwise
    #[serde(default)]
    code: serde_json::Value,
    #[serde(default, deserialize_with = "null_as_default")]
    message: String,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default, deserialize_with = "null_as_default")]
    meta: QuakeMeta,
}

#[derive(Debug, Default, Deserialize)]
struct QuakeMeta {
    #[serde(default, deserialize_with = "null_as_default")]
    pagination: QuakePagination,
}

#[derive(Debug, Default, Deserialize)]
struct QuakePagination {
    #[serde(default, deserialize_with = "null_as_default")]
    total: u64,
}

#[derive(Debug, Deserialize)]
struct QuakeItem {
    #[serde(default, deserialize_with = "null_as_default")]
    ip: String,
    #[serde(default, deserialize_with = "null_as_default")]
    port: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    transport: String,
    #[serde(default, deserialize_with = "null_as_default")]
    service: QuakeService,
}

#[derive(Debug, Default, Deserialize)]
struct QuakeService {
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    http: QuakeHttp,
}

#[derive(Debug, Default, Deserialize)]
struct QuakeHttp {
    #[serde(default, deserialize_with = "null_as_default")]
    host: String,
    #[serde(default, deserialize_with = "null_as_default")]
    title: String,
}

impl QuakeItem {
    fn into_record(self, source: &str, query: &str) -> Record {
        let mut record = Record::new(source).with_prompt(query);
        record.port = format!("{}/{}", self.port, self.transport);
        record.protocol = self.service.name;
        record.title = self.service.http.title;

        let http_host = self.service.http.host;
        if !http_host.is_empty() && !http_host.contains(&self.ip) {
            let host = http_host.split(':').next().unwrap_or_default();
            record.hosts.push(host.to_string());
        }
        match record.protocol.as_str() {
            "http" => record.url = format!("http://{}", http_host),
            "http/ssl" => record.url = format!("https://{}", http_host),
            _ => {}
        }
        record.ip = self.ip;
        record
    }
}

impl Engine for Quake {
    fn name(&self) -> &str {
        "quake"
    }

    fn page_size(&self) -> u32 {
        self.endpoint.page_size
    }

    fn init(&mut self, config: &ProviderConfig) {
        self.endpoint.apply(config);
    }

    fn build_query(&self, key: &SearchKey) -> Option<String> {
        let query = match key {
            SearchKey::Ip(ip) => format!(r#"ip:"{}""#, ip),
            SearchKey::Domain(domain) => format!(r#"domain:"*.{}""#, domain),
            SearchKey::Favicon(icon) if !icon.md5.is_empty() => {
                format!(r#"favicon:"{}""#, icon.md5)
            }
            SearchKey::Favicon(_) => return None,
            SearchKey::Cert(cert) => format!(r#"cert:"{}""#, cert),
        };
        Some(query)
    }

    fn request(
        &self,
        credential: &Credential,
        query: &str,
        cursor: &Cursor,
    ) -> Result<EngineRequest, SourceError> {
        let token = require_token(self.name(), credential)?;
        let body = serde_json::json!({
            "query": query,
            "size": self.endpoint.page_size,
            "start": cursor.fetched,
            "ignore_cache": true,
            "include": INCLUDE,
        });

        Ok(
            EngineRequest::post(self.endpoint.url("/api/v3/search/quake_service"))
                .header("Content-Type", "application/json")
                .header("X-QuakeToken", token)
                .json(body),
        )
    }

    fn response(&self, response: EngineResponse, query: &str) -> Result<Page, SourceError> {
        let body: QuakeResponse = match response.json() {
            Ok(body) => body,
            Err(_) if !response.is_success() => return Err(SourceError::Http(response.status)),
            Err(e) => return Err(e),
        };
        if body.code != serde_json::json!(0) {
            return Err(SourceError::Api(body.message));
        }

        let items: Vec<QuakeItem> = if body.data.is_null() {
            Vec::new()
        } else {
            serde_json::from_value(body.data)
                .map_err(|_| SourceError::Decode("wrong format".to_string()))?
        };
        let returned = items.len();
        let records = items
            .into_iter()
            .map(|item| item.into_record(self.name(), query))
            .collect();

        Ok(Page {
            records,
            returned,
            total: Some(body.meta.pagination.total),
        })
    }

    fn next_cursor(&self, cursor: &Cursor, page: &Page) -> Option<Cursor> {
        if page.returned < self.endpoint.page_size as usize {
            return None;
        }
        let next = cursor.advance(page.returned);
        let total = page.total.unwrap_or_default();
        if total == 0 || next.fetched >= total {
            return None;
        }
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::RequestBody;

    fn response(body: serde_json::Value) -> EngineResponse {
        EngineResponse {
            status: 200,
            text: body.to_string(),
            url: String::new(),
        }
    }

    #[test]
    fn test_quake_request_body() {
        let quake = Quake::new();
        let credential = Credential::token("tok").unwrap();
        let cursor = Cursor::first().advance(500);
        let request = quake.request(&credential, r#"ip:"1.2.3.4""#, &cursor).unwrap();

        assert_eq!(request.url, "https://quake.360.net/api/v3/search/quake_service");
        assert_eq!(request.headers["X-QuakeToken"], "tok");
        let Some(RequestBody::Json(body)) = request.data else {
            panic!("expected JSON body");
        };
        assert_eq!(body["start"], 500);
        assert_eq!(body["size"], 500);
        assert_eq!(body["ignore_cache"], true);
        assert_eq!(body["include"][5], "service.http.host");
    }

    #[test]
    fn test_quake_dialect() {
        let quake = Quake::new();
        assert_eq!(
            quake
                .build_query(&SearchKey::Domain("example.com".into()))
                .unwrap(),
            r#"domain:"*.example.com""#
        );
    }

    #[test]
    fn test_quake_response_mapping() {
        let quake = Quake::new();
        let page = quake
            .response(
                response(serde_json::json!({
                    "code": 0,
                    "message": "Successful.",
                    "data": [
                        {
                            "ip": "1.2.3.4", "port": 443, "transport": "tcp",
                            "service": {
                                "name": "http/ssl",
                                "http": {"host": "www.example.com:443", "title": "Home"}
                            }
                        },
                        {
                            "ip": "1.2.3.4", "port": 80, "transport": "tcp",
                            "service": {"name": "http", "http": {"host": "1.2.3.4", "title": ""}}
                        },
                        {
                            "ip": "1.2.3.4", "port": 22, "transport": "tcp",
                            "service": {"name": "ssh"}
                        }
                    ],
                    "meta": {
                        "pagination": {"count": 3, "page_index": 1, "page_size": 500, "total": 3}
                    }
                })),
                r#"ip:"1.2.3.4""#,
            )
            .unwrap();

        let tls = &page.records[0];
        assert_eq!(tls.port, "443/tcp");
        assert_eq!(tls.hosts, vec!["www.example.com"]);
        assert_eq!(tls.url, "https://www.example.com:443");
        assert_eq!(tls.title, "Home");

        let plain = &page.records[1];
        assert!(plain.hosts.is_empty());
        assert_eq!(plain.url, "http://1.2.3.4");

        let ssh = &page.records[2];
        assert!(ssh.url.is_empty());
        assert_eq!(ssh.protocol, "ssh");
        assert_eq!(page.total, Some(3));
    }

    #[test]
    fn test_quake_string_code_is_error() {
        let quake = Quake::new();
        let err = quake
            .response(
                response(serde_json::json!({"code": "q3005", "message": "quota exceeded"})),
                "q",
            )
            .unwrap_err();
        assert_eq!(err, SourceError::Api("quota exceeded".to_string()));
    }

    #[test]
    fn test_quake_wrong_data_format() {
        let quake = Quake::new();
        let err = quake
            .response(response(serde_json::json!({"code": 0, "data": {}})), "q")
            .unwrap_err();
        assert_eq!(err, SourceError::Decode("wrong format".to_string()));
    }

    #[test]
    fn test_quake_stops_at_total() {
        let quake = Quake::new();
        let page = Page {
            records: vec![],
            returned: 500,
            total: Some(1000),
        };
        let second = quake.next_cursor(&Cursor::first(), &page).unwrap();
        assert_eq!(second.fetched, 500);
        assert!(quake.next_cursor(&second, &page).is_none());

        let unknown_total = Page {
            total: Some(0),
            ..page
        };
        assert!(quake.next_cursor(&Cursor::first(), &unknown_total).is_none());
    }

    #[test]
    fn test_quake_null_sub_objects() {
        let quake = Quake::new();
        let page = quake
            .response(
                response(serde_json::json!({
                    "code": 0,
                    "message": null,
                    "data": [
                        {"ip": "1.2.3.4", "port": 22, "transport": "tcp",
                         "service": {"name": "ssh", "http": null}},
                        {"ip": "1.2.3.4", "port": 80, "transport": null, "service": null},
                        {"ip": "1.2.3.4", "port": 443, "transport": "tcp",
                         "service": {"name": "http", "http": {"host": "1.2.3.4", "title": null}}}
                    ],
                    "meta": {"pagination": null}
                })),
                "q",
            )
            .unwrap();

        assert_eq!(page.records.len(), 3);
        assert_eq!(page.records[0].protocol, "ssh");
        assert!(page.records[0].url.is_empty());
        assert_eq!(page.records[1].port, "80/");
        assert_eq!(page.records[2].url, "http://1.2.3.4");
        assert_eq!(page.total, Some(0));
    }
}
