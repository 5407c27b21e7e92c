//! utmkeep-storage: client-side storage boundary.
//! Key-value and cookie seams with in-memory backends, the attribution
//! record store (primary + cookie fallback + read-time expiry), and the
//! per-session identifier.

pub mod cookie;
pub mod error;
pub mod kv;
pub mod record_store;
pub mod session;

pub use cookie::{Cookie, CookieJar, MemoryCookieJar};
pub use error::StorageError;
pub use kv::{KeyValueStore, MemoryStore};
pub use record_store::{RecordStore, WriteOutcome};
pub use session::SessionTagger;
