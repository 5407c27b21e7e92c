//! Cookie channel used as the record fallback.

use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::StorageError;

/// Same reserved set as `encodeURIComponent`.
const COOKIE_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_value(raw: &str) -> String {
    utf8_percent_encode(raw, COOKIE_VALUE).to_string()
}

pub fn decode_value(name: &str, encoded: &str) -> Result<String, StorageError> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| StorageError::CookieEncoding {
            name: name.to_string(),
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    /// Already URL-encoded.
    pub value: String,
    pub path: String,
    pub expires: DateTime<Utc>,
}

impl Cookie {
    /// Cookie for the whole origin with a URL-encoded value.
    pub fn new(name: impl Into<String>, raw_value: &str, expires: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            value: encode_value(raw_value),
            path: "/".to_string(),
            expires,
        }
    }

    /// `document.cookie` assignment string.
    pub fn to_header_value(&self) -> String {
        format!(
            "{}={}; path={}; expires={}; SameSite=Lax",
            self.name,
            self.value,
            self.path,
            self.expires.format("%a, %d %b %Y %H:%M:%S GMT")
        )
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }
}

/// Cookie storage for the current origin. `get` returns the still-encoded
/// value of an unexpired cookie.
pub trait CookieJar: Send + Sync {
    fn get(&self, name: &str, now: DateTime<Utc>) -> Result<Option<String>, StorageError>;
    fn set(&self, cookie: Cookie) -> Result<(), StorageError>;
    fn remove(&self, name: &str) -> Result<(), StorageError>;
}

impl<T: CookieJar + ?Sized> CookieJar for &T {
    fn get(&self, name: &str, now: DateTime<Utc>) -> Result<Option<String>, StorageError> {
        (**self).get(name, now)
    }
    fn set(&self, cookie: Cookie) -> Result<(), StorageError> {
        (**self).set(cookie)
    }
    fn remove(&self, name: &str) -> Result<(), StorageError> {
        (**self).remove(name)
    }
}

impl<T: CookieJar + ?Sized> CookieJar for Arc<T> {
    fn get(&self, name: &str, now: DateTime<Utc>) -> Result<Option<String>, StorageError> {
        (**self).get(name, now)
    }
    fn set(&self, cookie: Cookie) -> Result<(), StorageError> {
        (**self).set(cookie)
    }
    fn remove(&self, name: &str) -> Result<(), StorageError> {
        (**self).remove(name)
    }
}

#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<HashMap<String, Cookie>>,
    disabled: AtomicBool,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.disabled.store(!available, Ordering::SeqCst);
    }

    /// Stored cookie regardless of expiry.
    pub fn peek(&self, name: &str) -> Option<Cookie> {
        self.lock().get(name).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Cookie>> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("cookies are disabled".into()));
        }
        Ok(())
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str, now: DateTime<Utc>) -> Result<Option<String>, StorageError> {
        self.check_available()?;
        let mut cookies = self.lock();
        let expired = match cookies.get(name) {
            Some(c) => c.is_expired(now),
            None => return Ok(None),
        };
        if expired {
            cookies.remove(name);
            return Ok(None);
        }
        Ok(cookies.get(name).map(|c| c.value.clone()))
    }

    fn set(&self, cookie: Cookie) -> Result<(), StorageError> {
        self.check_available()?;
        self.lock().insert(cookie.name.clone(), cookie);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.lock().remove(name);
        Ok(())
    }
}
