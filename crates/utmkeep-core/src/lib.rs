//! utmkeep-core: attribution data model and pure logic.
//! Tracked parameters, the attribution record and its wire format,
//! value sanitization, URL capture, and tracker configuration.
//! No IO: storage and DOM access live in sibling crates.

pub mod capture;
pub mod config;
pub mod error;
pub mod record;
pub mod sanitize;
pub mod types;

pub use capture::{PageContext, capture, extract_params};
pub use config::{ExtraBinding, FieldBinding, HiddenFieldMarkup, ReplayStrategy, TrackerConfig};
pub use error::{ConfigError, RecordError};
pub use record::AttributionRecord;
pub use sanitize::{FORBIDDEN_CHARS, sanitize_value};
pub use types::{AttributionKey, TrackedParam};
