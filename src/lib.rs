//! cmap-rs: concurrent asset search across cyberspace search engines
//!
//! Queries fofa, hunter, quake and shodan in parallel for a set of IPs,
//! domains, favicon hashes and certificate keywords, normalizes every answer
//! into one [`Record`] shape and streams the combined results to a consumer.

pub mod config;
pub mod engines;
pub mod error;
pub mod network;
pub mod results;
pub mod search;

pub use config::{Credential, CredentialStore, Settings};
pub use engines::{Engine, EngineLoader, EngineRegistry, RecordStream, Source};
pub use error::{Error, Result, SourceError};
pub use network::Session;
pub use results::{Record, ResultContainer};
pub use search::{FaviconHash, Search, SearchKey, SearchKeys};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Capacity of the shared delivery channel
pub const DEFAULT_CHANNEL_BUFFER: usize = 32;

/// Default request ceiling per rate limit window
pub const DEFAULT_RATE_LIMIT: u32 = 30;

/// Default rate limit window in seconds
pub const DEFAULT_RATE_LIMIT_PERIOD: u64 = 60;

/// Wall-clock ceiling for one provider invocation in seconds
pub const DEFAULT_QUERY_DEADLINE: u64 = 600;

/// Default HTTP request timeout in seconds
pub const DEFAULT_TIMEOUT: u64 = 30;
