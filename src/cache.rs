//! Access token caching
//!
//! Daraja OAuth tokens live for an hour. The client asks a [`TokenCache`]
//! before requesting a new one; the cache is injected so deployments can back
//! it with whatever shared store they already run.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Key/value store with per-entry expiry
pub trait TokenCache: Send + Sync {
    /// Fetch an unexpired value
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value for `ttl`
    fn put(&self, key: &str, value: String, ttl: Duration);

    /// Drop a value
    fn invalidate(&self, key: &str);
}

/// Process-local [`TokenCache`]
#[derive(Debug, Default)]
pub struct InMemoryTokenCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryTokenCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenCache for InMemoryTokenCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, expires_at)) if Instant::now() < *expires_at => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.lock().insert(key.to_string(), (value, expires_at));
    }

    fn invalidate(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}
