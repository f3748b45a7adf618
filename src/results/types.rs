//! Result type definitions

use crate::error::SourceError;
use serde::{Deserialize, Serialize};

/// One discovered network asset, or one provider failure.
///
/// A record whose `error` is set is an out-of-band signal from `source`;
/// every other field apart from the arrival `timestamp` is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub ip: String,
    /// Port and transport, e.g. `443/tcp`
    pub port: String,
    /// Application protocol
    pub protocol: String,
    /// Associated hostnames
    #[serde(rename = "host")]
    pub hosts: Vec<String>,
    pub url: String,
    pub title: String,
    /// Product or fingerprint string
    pub fingerprint: String,
    /// Provider that produced the record
    pub source: String,
    /// Provider query that matched the record
    pub prompt: String,
    /// Provider-supplied update time
    #[serde(rename = "lastupdate")]
    pub last_update: String,
    /// Arrival time (unix seconds), stamped by the orchestrator
    pub timestamp: i64,
    #[serde(skip)]
    pub error: Option<SourceError>,
}

impl Record {
    /// Create an empty record for a source
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Create an error record for a source
    pub fn failure(source: impl Into<String>, error: SourceError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(source)
        }
    }

    /// Set the prompt
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Check whether this record signals a provider failure
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Port number without the transport suffix
    pub fn port_number(&self) -> &str {
        self.port.split('/').next().unwrap_or_default()
    }

    /// `ip:port`, bracketing IPv6 addresses
    pub fn ip_port(&self) -> String {
        if self.ip.contains(':') {
            format!("[{}]:{}", self.ip, self.port_number())
        } else {
            format!("{}:{}", self.ip, self.port_number())
        }
    }

    /// Tab separated one-line summary
    pub fn pretty_print(&self) -> String {
        let mut msg = format!("{}\t{}", self.ip_port(), self.protocol);
        if !self.fingerprint.is_empty() {
            msg.push('\t');
            msg.push_str(&self.fingerprint);
        }
        msg
    }

    /// JSON representation, without the error field
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
