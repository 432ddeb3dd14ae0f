//! Memory store (component D).
//!
//! A single-node counter store built directly on one [`RevolvingMap`]. No
//! network, no cross-node coordination - deterministic under
//! single-threaded callers, last-writer-wins under concurrent ones (an
//! accepted imprecision for rate limiting; see spec.md §4.4).

use std::time::Duration;

use async_trait::async_trait;

use crate::revolving_map::RevolvingMap;
use crate::store::CounterStore;

/// Local-only counter store.
///
/// `incr_and_get` computes `max(A[key], B[key]) + 1` and writes that value
/// back to both halves of the revolving map - the `max` is what lets a
/// freshly-cleaned half get re-seeded from its surviving sibling instead of
/// resetting the count to zero every time the cleaner flips.
pub struct MemoryStore {
    counters: RevolvingMap<i64>,
}

impl MemoryStore {
    /// Builds a store whose counters are evicted `2 * max_ttl` after being
    /// last touched by the revolving map's cleanup cycle.
    pub fn new(max_ttl: Duration) -> Self {
        Self {
            counters: RevolvingMap::new(max_ttl),
        }
    }

    /// Signals the underlying revolving map's cleaner task to stop and
    /// waits for it to exit.
    pub async fn shutdown(&self) {
        self.counters.shutdown().await;
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn incr_and_get(&self, key: &str) -> i64 {
        self.counters.max_of_both_then_put(key).await
    }
}
