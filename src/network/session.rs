//! Rate-limited request executor shared by all providers of a run

use super::client::HttpClient;
use crate::config::{NetworkSettings, RateLimitSettings, Settings};
use crate::engines::{EngineRequest, EngineResponse};
use crate::error::{Error, Result, SourceError};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// HTTP session enforcing a request ceiling across every provider.
///
/// All providers share one limiter unless an override is installed for a
/// provider name. Acquisition waits for capacity; requests are never dropped.
pub struct Session {
    client: HttpClient,
    limiter: Arc<DefaultDirectRateLimiter>,
    overrides: HashMap<String, Arc<DefaultDirectRateLimiter>>,
}

impl Session {
    /// Create a session from network settings
    pub fn new(settings: &NetworkSettings) -> Result<Self> {
        Ok(Self {
            client: HttpClient::with_settings(settings)?,
            limiter: Arc::new(build_limiter(&settings.rate_limit)?),
            overrides: HashMap::new(),
        })
    }

    /// Create a session with the provider overrides found in settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut session = Self::new(&settings.network)?;
        for (name, config) in &settings.providers {
            if let Some(limit) = config.rate_limit {
                session = session.with_rate_limit(name, limit)?;
            }
        }
        Ok(session)
    }

    /// Install a provider-specific limiter replacing the shared one for that provider
    pub fn with_rate_limit(mut self, provider: &str, limit: RateLimitSettings) -> Result<Self> {
        self.overrides
            .insert(provider.to_string(), Arc::new(build_limiter(&limit)?));
        Ok(self)
    }

    /// Wait until the provider may issue one more request
    pub async fn acquire(&self, provider: &str) {
        let limiter = self.overrides.get(provider).unwrap_or(&self.limiter);
        limiter.until_ready().await;
    }

    /// Acquire a rate limit slot, then send the request
    pub async fn execute(
        &self,
        request: EngineRequest,
        provider: &str,
    ) -> std::result::Result<EngineResponse, SourceError> {
        self.acquire(provider).await;
        debug!("[{}] {:?} {}", provider, request.method, request.url);
        self.client.execute(request).await
    }
}

/// Build a limiter allowing `requests` per `per_seconds`, all usable as a burst
fn build_limiter(limit: &RateLimitSettings) -> Result<DefaultDirectRateLimiter> {
    let burst = NonZeroU32::new(limit.requests)
        .ok_or_else(|| Error::InvalidRateLimit("requests must be positive".to_string()))?;
    let window = Duration::from_secs(limit.per_seconds);
    let quota = Quota::with_period(window / limit.requests)
        .ok_or_else(|| Error::InvalidRateLimit("window must be positive".to_string()))?
        .allow_burst(burst);
    Ok(RateLimiter::direct(quota))
}
