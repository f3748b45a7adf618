//! HTTP networking module
//!
//! Provides the HTTP client and the rate-limited session providers share.

mod client;
mod session;

pub use client::{HttpClient, DEFAULT_USER_AGENT};
pub use session::Session;
