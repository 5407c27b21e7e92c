//! Per-session identifier kept in session storage.

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, warn};

use crate::kv::KeyValueStore;

const SUFFIX_LEN: usize = 9;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Hands out one identifier per browsing session.
pub struct SessionTagger<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> SessionTagger<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Identifier already stored for this session, if readable.
    pub fn current(&self) -> Option<String> {
        match self.store.get(&self.key) {
            Ok(id) => id.filter(|s| !s.is_empty()),
            Err(e) => {
                warn!(key = %self.key, error = %e, "session storage read failed");
                None
            }
        }
    }

    /// Stored identifier, or a fresh one persisted for the rest of the
    /// session. A fresh id is still returned when it cannot be persisted.
    pub fn get_or_create(&self, now: DateTime<Utc>) -> String {
        if let Some(id) = self.current() {
            return id;
        }
        let id = generate_session_id(now);
        match self.store.set(&self.key, &id) {
            Ok(()) => debug!(session_id = %id, "new session id"),
            Err(e) => warn!(key = %self.key, error = %e, "session id not persisted"),
        }
        id
    }
}

/// `sess_<epoch-ms>_<9 base36 chars>`. Unique enough to tell sessions
/// apart, not a secret.
pub fn generate_session_id(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| char::from(BASE36[rng.gen_range(0..BASE36.len())]))
        .collect();
    format!("sess_{}_{suffix}", now.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    #[test]
    fn id_format() {
        let now = Utc::now();
        let id = generate_session_id(now);
        let rest = id.strip_prefix("sess_").expect("prefix");
        let (ms, suffix) = rest.split_once('_').expect("separator");
        assert_eq!(ms.parse::<i64>().expect("millis"), now.timestamp_millis());
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.bytes().all(|b| BASE36.contains(&b)));
    }

    #[test]
    fn reuses_stored_id() {
        let tagger = SessionTagger::new(MemoryStore::new(), "utm_session_id");
        assert_eq!(tagger.current(), None);
        let first = tagger.get_or_create(Utc::now());
        let second = tagger.get_or_create(Utc::now());
        assert_eq!(first, second);
        assert_eq!(tagger.store().peek("utm_session_id"), Some(first));
    }

    #[test]
    fn keeps_preexisting_id() {
        let store = MemoryStore::new();
        store.set("utm_session_id", "sess_host_given").expect("seed");
        let tagger = SessionTagger::new(store, "utm_session_id");
        assert_eq!(tagger.get_or_create(Utc::now()), "sess_host_given");
    }

    #[test]
    fn unavailable_storage_still_yields_id() {
        let tagger = SessionTagger::new(MemoryStore::disabled(), "utm_session_id");
        let id = tagger.get_or_create(Utc::now());
        assert!(id.starts_with("sess_"));
    }
}
