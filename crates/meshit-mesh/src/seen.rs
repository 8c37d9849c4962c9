//! Bounded dedup cache for relayed messages.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use meshit_proto::limits::SEEN_CACHE_MAX;

/// Insert-or-drop cache of message keys.
///
/// The insert is a single atomic check-and-insert under one lock, so two
/// concurrent ingests of the same message produce exactly one `true`. When
/// the cache overflows its capacity, the older half (by insert time) is
/// evicted in one sweep.
pub struct SeenCache {
    inner: Mutex<HashMap<String, Instant>>,
    capacity: usize,
}

impl SeenCache {
    /// Create a cache with the protocol default capacity.
    pub fn new() -> Self {
        Self::with_capacity(SEEN_CACHE_MAX)
    }

    /// Create a cache with an explicit capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// Record a key. Returns `true` if it was new, `false` for a duplicate.
    pub fn insert(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().expect("seen cache poisoned");
        if inner.contains_key(key) {
            return false;
        }
        inner.insert(key.to_string(), Instant::now());

        if inner.len() > self.capacity {
            let mut by_age: Vec<(String, Instant)> =
                inner.iter().map(|(k, t)| (k.clone(), *t)).collect();
            by_age.sort_by_key(|(_, t)| *t);
            for (key, _) in by_age.iter().take(inner.len() / 2) {
                inner.remove(key);
            }
        }
        true
    }

    /// Whether a key has been recorded.
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .expect("seen cache poisoned")
            .contains_key(key)
    }

    /// Number of recorded keys.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("seen cache poisoned").len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SeenCache {
    fn default() -> Self {
        Self::new()
    }
}
