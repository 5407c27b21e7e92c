//! Error types for the attribution core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failure to decode a stored attribution record.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no tracked parameters")]
    NoTrackedParams,

    #[error("record has no usable saved_at timestamp")]
    MissingTimestamp,

    #[error("unknown attribution key: {0}")]
    UnknownKey(String),
}
