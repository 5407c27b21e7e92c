//! Extraction of tracked parameters from the current page URL.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use url::Url;

use crate::record::AttributionRecord;
use crate::sanitize::sanitize_value;
use crate::types::TrackedParam;

/// What capture needs to know about the page being viewed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub url: Url,
    /// `document.referrer`; empty when the visit had none.
    pub referrer: String,
}

impl PageContext {
    pub fn new(url: Url, referrer: impl Into<String>) -> Self {
        Self {
            url,
            referrer: referrer.into(),
        }
    }

    pub fn parse(url: &str, referrer: impl Into<String>) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?, referrer))
    }
}

/// Sanitized values of the tracked parameters present in `url`'s query.
///
/// Only the first occurrence of a name counts. Values that are empty before
/// or after sanitization are treated as absent.
pub fn extract_params(url: &Url, max_value_len: usize) -> BTreeMap<TrackedParam, String> {
    let mut seen = HashSet::new();
    let mut params = BTreeMap::new();

    for (name, value) in url.query_pairs() {
        let Some(param) = TrackedParam::from_name(&name) else {
            continue;
        };
        if !seen.insert(param) {
            continue;
        }
        let cleaned = sanitize_value(&value, max_value_len);
        if !cleaned.is_empty() {
            params.insert(param, cleaned);
        }
    }

    params
}

/// Build a record from the page URL, or `None` if no tracked parameter is
/// present. Pure: nothing is stored.
pub fn capture(
    page: &PageContext,
    max_value_len: usize,
    now: DateTime<Utc>,
) -> Option<AttributionRecord> {
    let params = extract_params(&page.url, max_value_len);
    AttributionRecord::new(params, page.url.as_str(), page.referrer.as_str(), now)
}
