//! Per-method TTL cache with stale fallback (§4.1). Keyed by request fingerprint
//! so different accounts/limits never collide.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Entry<T> {
    value: T,
    inserted_at: Instant,
}

pub struct TtlCache<T: Clone> {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<T>>>,
}

pub enum CacheLookup<T> {
    Fresh(T),
    Stale(T),
    Miss,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entries: Mutex::new(HashMap::new()) }
    }

    pub fn get(&self, key: &str) -> CacheLookup<T> {
        match self.entries.lock().get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => CacheLookup::Fresh(entry.value.clone()),
            Some(entry) => CacheLookup::Stale(entry.value.clone()),
            None => CacheLookup::Miss,
        }
    }

    pub fn put(&self, key: impl Into<String>, value: T) {
        self.entries.lock().insert(key.into(), Entry { value, inserted_at: Instant::now() });
    }
}
