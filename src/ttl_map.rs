//! TTL map (component B).
//!
//! A single-node key/value map whose entries expire lazily. No background
//! sweeper: expiry is checked on `get` and the entry is evicted at that
//! point if stale. Not safe for concurrent mutation - callers confine an
//! instance to a single task, or wrap it themselves (spec.md §5).

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Result of a [`TtlMap::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<V> {
    Hit(V),
    Miss,
}

impl<V> Lookup<V> {
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Key/value map with per-entry, lazily-evicted expiry.
pub struct TtlMap<V> {
    entries: HashMap<String, Entry<V>>,
}

impl<V> Default for TtlMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> TtlMap<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Stores `value` under `key`, expiring after `ttl`. Overwrites any
    /// existing value and expiry for `key`.
    pub fn put(&mut self, key: impl Into<String>, value: V, ttl: Duration) {
        self.entries.insert(
            key.into(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Returns the value for `key`, or `Miss` if absent or expired. An
    /// expired entry is evicted as a side effect of the lookup.
    pub fn get(&mut self, key: &str) -> Lookup<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => Instant::now() >= entry.expires_at,
            None => return Lookup::Miss,
        };
        if expired {
            self.entries.remove(key);
            return Lookup::Miss;
        }
        Lookup::Hit(self.entries[key].value.clone())
    }
}
