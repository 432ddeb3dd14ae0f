//! Remote store (component E).
//!
//! Delegates counting to an external atomic-increment service with a TTL.
//! Every remote call may block on the network (spec.md §5); failures
//! degrade open rather than propagate (spec.md §7.1).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::remote_backend::RedisBackend;
use crate::remote_backend::RemoteBackend;
use crate::store::CounterStore;
use crate::ttl_map::TtlMap;

/// Single system-wide TTL bound for remote-store counters, chosen to
/// exceed every rule interval the original source expects to see (spec.md
/// §4.5, `original_source/src/cache/redis.go`'s `getMaxAllowedTime`).
/// Trades memory for compute: a counter key may outlive its owning rule
/// window in the remote service by a wide margin, but that's cheaper than
/// tracking every rule's interval centrally.
pub const MAX_TTL: Duration = Duration::from_secs(300);

/// Counter store delegating to an external KV service with atomic
/// increment and conditional set.
///
/// The local "seen" TTL map lets the store skip the existence check for
/// keys it already knows exist, turning the common case (`Incr` only)
/// into a single round trip instead of two.
pub struct RemoteStore {
    backend: Arc<dyn RemoteBackend>,
    seen: Mutex<TtlMap<()>>,
}

impl RemoteStore {
    /// Connects to Redis at `connection_url` (e.g. from
    /// [`crate::config::RemoteConfig::connection_url`]).
    pub async fn connect(connection_url: &str) -> Result<Self, StoreError> {
        let backend = RedisBackend::connect(connection_url)
            .await
            .map_err(|e| StoreError::RemoteHandshake(e.to_string()))?;
        Ok(Self::with_backend(Arc::new(backend)))
    }

    /// Builds a store against any [`RemoteBackend`] - the seam tests use
    /// to substitute an in-process fake.
    pub fn with_backend(backend: Arc<dyn RemoteBackend>) -> Self {
        Self {
            backend,
            seen: Mutex::new(TtlMap::new()),
        }
    }
}

#[async_trait]
impl CounterStore for RemoteStore {
    async fn incr_and_get(&self, key: &str) -> i64 {
        let already_seen = {
            let mut seen = self.seen.lock().await;
            seen.get(key).is_hit()
        };

        if !already_seen {
            match self.backend.get(key).await {
                Ok(None) => {
                    // Truly absent: seed it with a TTL so the remote
                    // service evicts it automatically, and return 1
                    // without an extra Incr round trip.
                    if let Err(err) = self.backend.set_if_absent(key, "1", MAX_TTL).await {
                        tracing::warn!(%key, error = %err, "set_if_absent failed; counter may not expire");
                    }
                    self.seen.lock().await.put(key, (), MAX_TTL);
                    return 1;
                }
                Ok(Some(_)) => {
                    self.seen.lock().await.put(key, (), MAX_TTL);
                }
                Err(err) => {
                    // Pessimistic: assume the counter exists, to avoid a
                    // stampede of SetIfAbsent calls (spec.md §7.1).
                    tracing::warn!(%key, error = %err, "existence check failed; degrading to HIT");
                    self.seen.lock().await.put(key, (), MAX_TTL);
                }
            }
        }

        match self.backend.incr(key).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(%key, error = %err, "incr failed; degrading open");
                0
            }
        }
    }
}
