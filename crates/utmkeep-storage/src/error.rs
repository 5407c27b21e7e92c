//! Error types for the storage boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage quota exceeded writing {key}: {needed} bytes, limit {limit}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    #[error("cookie value for {name} is not valid UTF-8 after decoding")]
    CookieEncoding { name: String },
}
