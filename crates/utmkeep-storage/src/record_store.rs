//! Persistence of the attribution record: primary key-value store, cookie
//! fallback, and expiry checked at read time.
//!
//! Nothing here returns an error to the caller. Storage failures are logged
//! and degrade to "no record" or a dropped write.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use utmkeep_core::{AttributionRecord, TrackerConfig};

use crate::cookie::{Cookie, CookieJar, decode_value};
use crate::kv::KeyValueStore;

/// Where a write ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Primary,
    Fallback,
    /// Neither channel accepted the record.
    Dropped,
}

pub struct RecordStore<P, C> {
    primary: P,
    fallback: C,
    storage_key: String,
    cookie_name: String,
    retention: Duration,
}

impl<P: KeyValueStore, C: CookieJar> RecordStore<P, C> {
    pub fn new(primary: P, fallback: C, config: &TrackerConfig) -> Self {
        Self {
            primary,
            fallback,
            storage_key: config.storage_key.clone(),
            cookie_name: config.fallback_cookie.clone(),
            retention: config.retention(),
        }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn fallback(&self) -> &C {
        &self.fallback
    }

    /// Persist `record`, falling back to the cookie if the primary store
    /// rejects the write.
    ///
    /// Only the channel holding the new record keeps an entry; the other is
    /// cleared so a superseded record cannot be read back.
    pub fn write(&self, record: &AttributionRecord) -> WriteOutcome {
        let json = record.to_json();
        match self.primary.set(&self.storage_key, &json) {
            Ok(()) => {
                debug!(key = %self.storage_key, "attribution record stored");
                self.remove_fallback();
                return WriteOutcome::Primary;
            }
            Err(e) => {
                warn!(key = %self.storage_key, error = %e, "primary storage write failed, trying cookie");
                self.remove_primary();
            }
        }

        let cookie = Cookie::new(&self.cookie_name, &json, record.expires_at(self.retention));
        match self.fallback.set(cookie) {
            Ok(()) => {
                info!(cookie = %self.cookie_name, "attribution record stored in fallback cookie");
                WriteOutcome::Fallback
            }
            Err(e) => {
                warn!(cookie = %self.cookie_name, error = %e, "fallback cookie write failed, record dropped");
                WriteOutcome::Dropped
            }
        }
    }

    /// Current unexpired record, if any.
    ///
    /// Malformed entries are removed. An expired record is removed from both
    /// channels. A record found only in the cookie is copied into the
    /// primary store.
    pub fn read(&self, now: DateTime<Utc>) -> Option<AttributionRecord> {
        match self.primary.get(&self.storage_key) {
            Ok(Some(raw)) => match AttributionRecord::from_json(&raw) {
                Ok(record) => return self.unless_expired(record, now),
                Err(e) => {
                    warn!(key = %self.storage_key, error = %e, "discarding malformed attribution record");
                    self.remove_primary();
                }
            },
            Ok(None) => {}
            Err(e) => {
                warn!(key = %self.storage_key, error = %e, "primary storage read failed");
            }
        }

        let record = self.read_fallback(now)?;
        let record = self.unless_expired(record, now)?;
        match self.primary.set(&self.storage_key, &record.to_json()) {
            Ok(()) => {
                debug!(key = %self.storage_key, "promoted fallback record to primary storage");
                self.remove_fallback();
            }
            Err(e) => debug!(error = %e, "fallback record promotion skipped"),
        }
        Some(record)
    }

    /// Delete the record from every channel.
    pub fn clear(&self) {
        self.remove_primary();
        self.remove_fallback();
    }

    fn read_fallback(&self, now: DateTime<Utc>) -> Option<AttributionRecord> {
        let encoded = match self.fallback.get(&self.cookie_name, now) {
            Ok(Some(v)) => v,
            Ok(None) => return None,
            Err(e) => {
                warn!(cookie = %self.cookie_name, error = %e, "fallback cookie read failed");
                return None;
            }
        };
        let decoded = decode_value(&self.cookie_name, &encoded).map_err(|e| e.to_string());
        match decoded.and_then(|raw| AttributionRecord::from_json(&raw).map_err(|e| e.to_string())) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(cookie = %self.cookie_name, error = %e, "discarding malformed fallback cookie");
                self.remove_fallback();
                None
            }
        }
    }

    fn unless_expired(
        &self,
        record: AttributionRecord,
        now: DateTime<Utc>,
    ) -> Option<AttributionRecord> {
        if record.is_expired(now, self.retention) {
            info!(
                captured_at = %record.captured_at(),
                retention_days = self.retention.num_days(),
                "attribution record expired, removing"
            );
            self.clear();
            return None;
        }
        Some(record)
    }

    fn remove_primary(&self) {
        if let Err(e) = self.primary.remove(&self.storage_key) {
            warn!(key = %self.storage_key, error = %e, "primary storage remove failed");
        }
    }

    fn remove_fallback(&self) {
        if let Err(e) = self.fallback.remove(&self.cookie_name) {
            warn!(cookie = %self.cookie_name, error = %e, "fallback cookie remove failed");
        }
    }
}
