//! Unified error types for firecalc.
//!
//! Every failure surfaced to the hosting surface carries a stable upper-case
//! code as the prefix of its display string.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the rating engine, quote store and offline cache.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A quote input field is missing or out of range.
    #[error("VALIDATION_ERROR: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// The input names a rating dimension value absent from the rate table.
    #[error("UNKNOWN_RATE_KEY: {dimension} '{key}' is not in the rate table")]
    UnknownRateKey { dimension: &'static str, key: String },

    /// No saved quote with the given id.
    #[error("NOT_FOUND: quote {0}")]
    NotFound(u64),

    /// The durable store could not be read or written.
    #[error("PERSISTENCE_ERROR: {0}")]
    Persistence(String),

    /// Database operation failed.
    #[error("PERSISTENCE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// A cache write targeted a namespace that no longer exists.
    #[error("PERSISTENCE_ERROR: cache namespace '{0}' does not exist")]
    CacheNamespaceMissing(String),

    /// Migration failed to apply.
    #[error("PERSISTENCE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A static asset could not be fetched while installing a cache version.
    #[error("CACHE_ASSET_FETCH_ERROR: {path}: {reason}")]
    CacheAssetFetch { path: String, reason: String },

    /// A live fetch failed while serving a request.
    #[error("NETWORK_FETCH_ERROR: {0}")]
    NetworkFetch(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The cache control task is gone.
    #[error("CONTROL_UNAVAILABLE: cache control channel closed")]
    ControlClosed,

    /// Invalid tool or message parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Shorthand for a validation failure on a named field.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Validation { field: field.into(), reason: reason.into() }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Persistence(format!("malformed stored document: {err}"))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::Validation { .. } | Error::InvalidInput(_) => -32602,
            Error::UnknownRateKey { .. } => -32001,
            Error::NotFound(_) => -32002,
            Error::Persistence(_)
            | Error::Database(_)
            | Error::MigrationFailed(_)
            | Error::CacheNamespaceMissing(_) => -32003,
            Error::CacheAssetFetch { .. } => -32004,
            Error::NetworkFetch(_) => -32005,
            Error::InvalidUrl(_) => -32006,
            Error::ControlClosed => -32007,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownRateKey { dimension: "propertyType", key: "castle".to_string() };
        assert!(err.to_string().starts_with("UNKNOWN_RATE_KEY"));
        assert!(err.to_string().contains("castle"));

        let err = Error::validation("sumInsured", "must be at least 1000");
        assert_eq!(err.to_string(), "VALIDATION_ERROR: sumInsured: must be at least 1000");
    }

    #[test]
    fn test_error_to_mcp_error() {
        let mcp_err: McpError = Error::NotFound(42).into();
        assert_eq!(mcp_err.code.0, -32002);
        assert!(mcp_err.message.contains("42"));

        let mcp_err: McpError = Error::validation("location", "is required").into();
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_database_errors_share_persistence_code() {
        let mcp_err: McpError = Error::Database(tokio_rusqlite::Error::ConnectionClosed).into();
        assert_eq!(mcp_err.code.0, -32003);
        assert!(mcp_err.message.starts_with("PERSISTENCE_ERROR"));
    }
}
