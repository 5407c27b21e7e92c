//! Error types for the runtime.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("navigation hook unavailable: {0}")]
    Unavailable(String),
}
