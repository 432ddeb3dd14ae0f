//! Revolving map (component C).
//!
//! A concurrent-safe key/value map whose bulk-expiry strategy keeps two
//! backing maps, *A* and *B*, written in lockstep, and periodically empties
//! whichever one was cleaned least recently. This trades precise per-entry
//! TTLs for O(1) bulk eviction with no per-read scan - see spec.md §4.3 and
//! `DESIGN.md` for why this is kept rather than replaced with a per-entry
//! scheme.
//!
//! Every entry survives at least one full `cleanup_interval` and at most
//! two, regardless of when within the period it was written.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MapPtr {
    A,
    B,
}

impl MapPtr {
    fn flipped(self) -> Self {
        match self {
            MapPtr::A => MapPtr::B,
            MapPtr::B => MapPtr::A,
        }
    }
}

struct Inner<V> {
    map_a: HashMap<String, V>,
    map_b: HashMap<String, V>,
    last_cleaned: MapPtr,
}

impl<V> Inner<V> {
    /// The currently active read map is the one that was *not* most
    /// recently cleaned - it still holds data from the previous period
    /// plus everything written since.
    fn active(&self) -> &HashMap<String, V> {
        match self.last_cleaned {
            MapPtr::A => &self.map_b,
            MapPtr::B => &self.map_a,
        }
    }

    /// Clears the map that is *not* `last_cleaned` (the one that has gone
    /// the longest without being emptied), then advances `last_cleaned` to
    /// name it - so `last_cleaned` always names the map most recently
    /// cleared, and [`Self::active`] (everything *except* `last_cleaned`)
    /// keeps serving the map with the longer history.
    fn clean_stale(&mut self) {
        let target = self.last_cleaned.flipped();
        match target {
            MapPtr::A => self.map_a.clear(),
            MapPtr::B => self.map_b.clear(),
        }
        self.last_cleaned = target;
    }
}

/// Dual-backed key/value map with coarse, scan-free bulk expiry.
///
/// Cloning a `RevolvingMap` is cheap and shares the same backing storage and
/// cleaner task (it's an `Arc` handle), matching the "one cleaner per map
/// instance" lock-granularity fix called out in spec.md §9 (the original
/// source shared a single process-wide lock across every instance).
pub struct RevolvingMap<V> {
    inner: Arc<RwLock<Inner<V>>>,
    cancel: CancellationToken,
    cleaner: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl<V> Clone for RevolvingMap<V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            cancel: self.cancel.clone(),
            cleaner: self.cleaner.clone(),
        }
    }
}

impl<V> RevolvingMap<V>
where
    V: Send + Sync + 'static,
{
    /// Constructs a map whose default `cleanup_interval` is `2 * max_ttl`,
    /// guaranteeing no entry is evicted before its declared TTL.
    pub fn new(max_ttl: Duration) -> Self {
        Self::with_cleanup_interval(max_ttl * 2)
    }

    /// Constructs a map with an explicit cleanup period, bypassing the
    /// `2 * max_ttl` derivation. Useful for tests that want to assert
    /// boundary behavior against a known tick (spec.md §8 scenario 4).
    pub fn with_cleanup_interval(cleanup_interval: Duration) -> Self {
        let inner = Arc::new(RwLock::new(Inner {
            map_a: HashMap::new(),
            map_b: HashMap::new(),
            last_cleaned: MapPtr::A,
        }));
        let cancel = CancellationToken::new();

        let task_inner = inner.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cleanup_interval);
            ticker.tick().await; // first tick fires immediately; consume it
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let mut guard = task_inner.write().await;
                        guard.clean_stale();
                        tracing::debug!("revolving map cleanup tick completed");
                    }
                }
            }
        });

        Self {
            inner,
            cancel,
            cleaner: Arc::new(std::sync::Mutex::new(Some(handle))),
        }
    }

    /// Signals the cleaner task to stop and waits for it to exit. Safe to
    /// call more than once or from multiple clones; only the first call
    /// does any work.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.cleaner.lock().expect("cleaner lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl<V> RevolvingMap<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Writes `value` under `key` into both backing maps.
    pub async fn put(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut guard = self.inner.write().await;
        guard.map_a.insert(key.clone(), value.clone());
        guard.map_b.insert(key, value);
    }

    /// Reads `key` from the currently active map.
    pub async fn get(&self, key: &str) -> Option<V> {
        let guard = self.inner.read().await;
        guard.active().get(key).cloned()
    }

    /// All keys currently visible in the active map.
    pub async fn keys(&self) -> Vec<String> {
        let guard = self.inner.read().await;
        guard.active().keys().cloned().collect()
    }

    /// A consistent point-in-time copy of the active map, taken under the
    /// map's read lock.
    ///
    /// This replaces the original `GetCurrentMapWithLock` (which handed
    /// callers a raw map reference plus its `RWMutex`): holding a lock guard
    /// across an `.await` in async Rust is a footgun (it can deadlock the
    /// single writer lock against itself, or hold up the cleaner
    /// indefinitely), so the equivalent here is an atomic snapshot taken
    /// while the lock is held, handed back as an owned value.
    pub async fn snapshot(&self) -> HashMap<String, V> {
        let guard = self.inner.read().await;
        guard.active().clone()
    }
}

impl RevolvingMap<i64> {
    /// Integer-specialized alias for [`RevolvingMap::put`], kept for parity
    /// with spec.md's `PutInt` operation (a vestige of the original's
    /// untyped map requiring a type-assertion dance Rust's generics make
    /// unnecessary).
    pub async fn put_int(&self, key: impl Into<String>, value: i64) {
        self.put(key, value).await;
    }

    /// Integer-specialized alias for [`RevolvingMap::get`].
    pub async fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).await
    }

    /// Atomically computes `max(A[key], B[key]) + 1` and writes that value
    /// back into both halves, returning it.
    ///
    /// This is the memory store's core correctness property (spec.md §4.4):
    /// taking the max of both halves, rather than trusting only the active
    /// one, means a fresh half - just after a cleanup flip zeroed it - gets
    /// re-seeded from the surviving half instead of resetting the count to
    /// zero. Done under a single write-lock acquisition so two concurrent
    /// callers can't both observe the pre-increment max and both write the
    /// same "next" value.
    pub(crate) async fn max_of_both_then_put(&self, key: &str) -> i64 {
        let mut guard = self.inner.write().await;
        let a = guard.map_a.get(key).copied().unwrap_or(0);
        let b = guard.map_b.get(key).copied().unwrap_or(0);
        let next = a.max(b) + 1;
        guard.map_a.insert(key.to_string(), next);
        guard.map_b.insert(key.to_string(), next);
        next
    }
}
