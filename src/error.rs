//! Error types for cmap-rs.

use thiserror::Error;

/// Result type alias for run setup and configuration.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop a run before any provider I/O happens.
#[derive(Error, Debug)]
pub enum Error {
    /// None of the requested providers is registered and enabled.
    #[error("no agent/source specified")]
    NoProviders,

    /// The search keys contain nothing to search for.
    #[error("no search keys specified")]
    NoKeys,

    /// No usable credential is configured for a provider.
    #[error("empty {0} keys")]
    MissingCredential(String),

    /// Rate limit settings that cannot form a quota.
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem error while reading settings or writing reports.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed.
    #[error("invalid settings file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Report serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Workbook could not be built or saved.
    #[error("xlsx error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// HTTP client construction failed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failure of a single provider request.
///
/// Carried inside error records, so it is cheap to clone and never holds
/// the underlying client error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The request could not be built or sent.
    #[error("request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success status.
    #[error("HTTP error: {0}")]
    Http(u16),

    /// The response body did not match the provider schema.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The provider reported an error in its response body.
    #[error("{0}")]
    Api(String),

    /// The selected credential does not fit the provider.
    #[error("unusable credential: {0}")]
    Credential(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else {
            SourceError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_display() {
        let err = Error::MissingCredential("fofa".to_string());
        assert_eq!(err.to_string(), "empty fofa keys");
    }

    #[test]
    fn test_no_providers_display() {
        assert_eq!(Error::NoProviders.to_string(), "no agent/source specified");
    }

    #[test]
    fn test_api_error_is_verbatim() {
        let err = SourceError::Api("account balance insufficient".to_string());
        assert_eq!(err.to_string(), "account balance insufficient");
    }

    #[test]
    fn test_json_error_maps_to_decode() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(SourceError::from(err), SourceError::Decode(_)));
    }
}
