//! The attribution record and its stored JSON form.
//!
//! Stored layout is a flat object: one string per tracked parameter, plus
//! `landing_url`, `referrer_url`, `timestamp` (RFC 3339), `saved_at` (epoch
//! milliseconds, authoritative for expiry) and an optional `session_id`.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::RecordError;
use crate::types::{AttributionKey, TrackedParam};

/// Attribution captured from a landing URL.
///
/// Always holds at least one tracked parameter. Only `session_id` changes
/// after capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributionRecord {
    params: BTreeMap<TrackedParam, String>,
    landing_url: String,
    referrer_url: String,
    captured_at: DateTime<Utc>,
    session_id: Option<String>,
}

impl AttributionRecord {
    /// Build a record. Returns `None` when `params` is empty.
    ///
    /// `captured_at` is truncated to millisecond precision so the record
    /// survives a trip through `saved_at` unchanged.
    pub fn new(
        params: BTreeMap<TrackedParam, String>,
        landing_url: impl Into<String>,
        referrer_url: impl Into<String>,
        captured_at: DateTime<Utc>,
    ) -> Option<Self> {
        if params.is_empty() {
            return None;
        }
        Some(Self {
            params,
            landing_url: landing_url.into(),
            referrer_url: referrer_url.into(),
            captured_at: truncate_to_millis(captured_at),
            session_id: None,
        })
    }

    pub fn param(&self, param: TrackedParam) -> Option<&str> {
        self.params.get(&param).map(String::as_str)
    }

    pub fn params(&self) -> &BTreeMap<TrackedParam, String> {
        &self.params
    }

    pub fn landing_url(&self) -> &str {
        &self.landing_url
    }

    pub fn referrer_url(&self) -> &str {
        &self.referrer_url
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Add or replace the session id. Returns true if the value changed.
    pub fn set_session_id(&mut self, session_id: impl Into<String>) -> bool {
        let session_id = session_id.into();
        if self.session_id.as_deref() == Some(session_id.as_str()) {
            return false;
        }
        self.session_id = Some(session_id);
        true
    }

    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.set_session_id(session_id);
        self
    }

    /// Value for a replayable key. Empty derived fields count as absent.
    pub fn get(&self, key: AttributionKey) -> Option<&str> {
        let value = match key {
            AttributionKey::Param(p) => return self.param(p),
            AttributionKey::LandingUrl => self.landing_url.as_str(),
            AttributionKey::ReferrerUrl => self.referrer_url.as_str(),
            AttributionKey::SessionId => self.session_id.as_deref()?,
        };
        (!value.is_empty()).then_some(value)
    }

    /// Non-empty `(key, value)` pairs in [`AttributionKey::ALL`] order.
    pub fn fields(&self) -> Vec<(AttributionKey, &str)> {
        AttributionKey::ALL
            .into_iter()
            .filter_map(|k| self.get(k).map(|v| (k, v)))
            .collect()
    }

    pub fn expires_at(&self, retention: Duration) -> DateTime<Utc> {
        self.captured_at + retention
    }

    /// Expired once `now >= captured_at + retention`.
    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        now >= self.expires_at(retention)
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.to_map()).to_string()
    }

    fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (param, value) in &self.params {
            map.insert(param.as_str().to_string(), Value::from(value.as_str()));
        }
        map.insert("landing_url".into(), Value::from(self.landing_url.as_str()));
        map.insert("referrer_url".into(), Value::from(self.referrer_url.as_str()));
        map.insert(
            "timestamp".into(),
            Value::from(self.captured_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        map.insert("saved_at".into(), Value::from(self.captured_at.timestamp_millis()));
        if let Some(ref session_id) = self.session_id {
            map.insert("session_id".into(), Value::from(session_id.as_str()));
        }
        map
    }

    /// Decode a stored record. Unknown keys are ignored; non-string
    /// parameter values are skipped.
    pub fn from_json(raw: &str) -> Result<Self, RecordError> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(map) = value else {
            return Err(RecordError::NotAnObject);
        };

        let params: BTreeMap<TrackedParam, String> = TrackedParam::ALL
            .into_iter()
            .filter_map(|p| {
                map.get(p.as_str())
                    .and_then(Value::as_str)
                    .filter(|v| !v.is_empty())
                    .map(|v| (p, v.to_string()))
            })
            .collect();
        if params.is_empty() {
            return Err(RecordError::NoTrackedParams);
        }

        // Tolerate float millis (JS `Date.now()` written by other tooling).
        let saved_at_ms = map
            .get("saved_at")
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .ok_or(RecordError::MissingTimestamp)?;
        let captured_at =
            DateTime::from_timestamp_millis(saved_at_ms).ok_or(RecordError::MissingTimestamp)?;

        let text = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let session_id = map
            .get("session_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            params,
            landing_url: text("landing_url"),
            referrer_url: text("referrer_url"),
            captured_at,
            session_id,
        })
    }
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(now: DateTime<Utc>) -> AttributionRecord {
        let params = BTreeMap::from([
            (TrackedParam::UtmSource, "google".to_string()),
            (TrackedParam::UtmMedium, "cpc".to_string()),
        ]);
        AttributionRecord::new(params, "https://shop.example/?utm_source=google", "", now)
            .expect("non-empty params")
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn empty_params_yield_no_record() {
        assert!(AttributionRecord::new(BTreeMap::new(), "u", "r", t0()).is_none());
    }

    #[test]
    fn json_roundtrip_preserves_record() {
        let record = sample(t0()).with_session_id("sess_1_abc");
        let back = AttributionRecord::from_json(&record.to_json()).expect("decode");
        assert_eq!(back, record);
    }

    #[test]
    fn json_layout_is_flat() {
        let json: Value = serde_json::from_str(&sample(t0()).to_json()).expect("json");
        assert_eq!(json["utm_source"], "google");
        assert_eq!(json["saved_at"], t0().timestamp_millis());
        assert_eq!(json["timestamp"], "2026-10-01T12:00:00.000Z");
        assert!(json.get("session_id").is_none());
    }

    #[test]
    fn captured_at_truncated_to_millis() {
        let ts = t0() + Duration::nanoseconds(1_234_567);
        let record = sample(ts);
        assert_eq!(record.captured_at(), t0() + Duration::milliseconds(1));
    }

    #[test]
    fn from_json_rejects_malformed() {
        assert!(matches!(
            AttributionRecord::from_json("{not json"),
            Err(RecordError::Json(_))
        ));
        assert!(matches!(
            AttributionRecord::from_json("[1,2]"),
            Err(RecordError::NotAnObject)
        ));
        assert!(matches!(
            AttributionRecord::from_json(r#"{"saved_at": 1}"#),
            Err(RecordError::NoTrackedParams)
        ));
        assert!(matches!(
            AttributionRecord::from_json(r#"{"gclid": "abc"}"#),
            Err(RecordError::MissingTimestamp)
        ));
    }

    #[test]
    fn from_json_ignores_unknown_keys() {
        let raw = r#"{"gclid":"abc","utm_id":"x","saved_at":1000,"extra":{"a":1}}"#;
        let record = AttributionRecord::from_json(raw).expect("decode");
        assert_eq!(record.param(TrackedParam::Gclid), Some("abc"));
        assert_eq!(record.params().len(), 1);
        assert_eq!(record.landing_url(), "");
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let record = sample(t0());
        let retention = Duration::days(30);
        assert!(!record.is_expired(t0() + Duration::days(30) - Duration::milliseconds(1), retention));
        assert!(record.is_expired(t0() + Duration::days(30), retention));
        assert!(record.is_expired(t0() + Duration::days(31), retention));
    }

    #[test]
    fn fields_skip_empty_derived_values() {
        let record = sample(t0());
        let keys: Vec<AttributionKey> = record.fields().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                AttributionKey::Param(TrackedParam::UtmSource),
                AttributionKey::Param(TrackedParam::UtmMedium),
                AttributionKey::LandingUrl,
            ]
        );
    }

    #[test]
    fn set_session_id_reports_change() {
        let mut record = sample(t0());
        assert!(record.set_session_id("a"));
        assert!(!record.set_session_id("a"));
        assert!(record.set_session_id("b"));
        assert_eq!(record.get(AttributionKey::SessionId), Some("b"));
    }
}
