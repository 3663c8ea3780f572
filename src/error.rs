// src/error.rs

//! Unified error handling for the synchronizer.
//!
//! Upstream failures (`FetchError`, `JsonError`) and validation failures
//! (`ValidationError`) are recoverable inside a sync run. Everything else that
//! reaches [`AppError`] aborts the run.

use std::fmt;

use thiserror::Error;

use crate::models::RecordKind;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Network-level failure of a single GET.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {message}")]
    ConnectionFailed { url: String, message: String },
}

/// Failure to obtain a JSON document from upstream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JsonError {
    #[error("could not parse JSON from {url}: {message}")]
    ParseFailure { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {message}")]
    ConnectionFailed { url: String, message: String },

    /// Upstream answered with its `{"id": 0}` placeholder.
    #[error("object at {url} does not exist")]
    NotFound { url: String },
}

impl JsonError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            Self::ParseFailure { url, .. }
            | Self::Timeout { url }
            | Self::ConnectionFailed { url, .. }
            | Self::NotFound { url } => url,
        }
    }
}

impl From<FetchError> for JsonError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout { url } => Self::Timeout { url },
            FetchError::ConnectionFailed { url, message } => Self::ConnectionFailed { url, message },
        }
    }
}

/// A single field that failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            field: field.into(),
            message: message.to_string(),
        }
    }
}

/// Every field of one upstream record that failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind} {base_id}: {}", format_fields(.fields))]
pub struct ValidationError {
    pub kind: RecordKind,
    pub base_id: i64,
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    /// Whether `field` is among the failing fields.
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Upstream JSON could not be obtained
    #[error("Upstream error: {0}")]
    Upstream(#[from] JsonError),

    /// Upstream record failed validation
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// SQLite operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage backend in an unusable state
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown analysis '{0}'")]
    UnknownAnalysis(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Whether a sync loop may count this error as a per-ID failure and move on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Validation(_))
    }
}
