//! HTTP client for making requests to provider APIs

use crate::config::NetworkSettings;
use crate::engines::{EngineRequest, EngineResponse, HttpMethod, RequestBody};
use crate::error::{Result, SourceError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::time::Duration;

/// User agent sent unless a provider sets its own
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:83.0) Gecko/20100101 Firefox/83.0";

/// HTTP client wrapper with provider request conventions
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    default_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(&NetworkSettings::default())
    }

    /// Create a new HTTP client with custom settings
    pub fn with_settings(settings: &NetworkSettings) -> Result<Self> {
        let timeout = Duration::from_secs(settings.request_timeout.max(1));
        let mut builder = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true);

        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ref proxy_url) = settings.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }

        Ok(Self {
            client: builder.build()?,
            default_timeout: timeout,
        })
    }

    /// Execute a provider request
    pub async fn execute(
        &self,
        request: EngineRequest,
    ) -> std::result::Result<EngineResponse, SourceError> {
        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        req_builder = req_builder
            .timeout(self.default_timeout)
            .headers(Self::build_headers(&request.headers)?);

        if !request.params.is_empty() {
            req_builder = req_builder.query(&request.params);
        }

        if let Some(RequestBody::Json(json)) = request.data {
            req_builder = req_builder.json(&json);
        }

        let response = req_builder.send().await?;

        Self::parse_response(response).await
    }

    /// Default headers overlaid with the request's own, later ones replacing earlier ones
    fn build_headers(
        custom: &HashMap<String, String>,
    ) -> std::result::Result<HeaderMap, SourceError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        for (key, value) in custom {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| SourceError::Request(format!("invalid header {}: {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| SourceError::Request(format!("invalid header {}: {}", key, e)))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }

    /// Parse response into EngineResponse
    async fn parse_response(
        response: Response,
    ) -> std::result::Result<EngineResponse, SourceError> {
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let text = response.text().await?;

        Ok(EngineResponse { status, text, url })
    }
}
