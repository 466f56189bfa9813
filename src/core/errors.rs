//! Shared error types for the application

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for mergemap operations
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors (invalid thresholds, bad rule patterns)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation errors (contract violations at component boundaries)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage errors with optional database path context
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<rusqlite::Error>,
    },

    /// HTTP acquisition errors
    #[error("GitLab API error: {message}")]
    Http {
        message: String,
        status: Option<u16>,
    },

    /// Enrichment subprocess errors
    #[error("Enrichment error: {0}")]
    Enrichment(String),

    /// Wrapped external errors
    #[error(transparent)]
    External(#[from] anyhow::Error),

    /// IO errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// SQLite errors without extra context
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// HTTP transport errors
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    /// Invalid rule pattern
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a storage error with path context
    pub fn storage(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Storage {
            message: message.into(),
            path: Some(path.into()),
            source: None,
        }
    }

    /// Create an HTTP error with status context
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Create an enrichment error
    pub fn enrichment(message: impl Into<String>) -> Self {
        Self::Enrichment(message.into())
    }
}

/// Result type alias using the mergemap error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("weak threshold must be below strong threshold");
        assert_eq!(
            err.to_string(),
            "Configuration error: weak threshold must be below strong threshold"
        );
    }

    #[test]
    fn test_storage_error_carries_path() {
        let err = Error::storage("cannot open database", "/tmp/mr.db");
        match err {
            Error::Storage { path, .. } => {
                assert_eq!(path, Some(PathBuf::from("/tmp/mr.db")));
            }
            _ => panic!("expected storage error"),
        }
    }
}
