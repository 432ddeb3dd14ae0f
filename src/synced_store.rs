//! Synced-memory store (component F) - the distributed core.
//!
//! Combines a local revolving map with an append-only stream for
//! cross-node aggregation. Three cooperating tasks per instance: the
//! caller-driven local counting path (never touches the network), a
//! periodic flush task, and a periodic reader task. See spec.md §4.6.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::RemoteConfig;
use crate::config::SyncConfig;
use crate::error::StoreError;
use crate::remote_backend::CounterStream;
use crate::remote_backend::RedisStream;
use crate::revolving_map::RevolvingMap;
use crate::store::CounterStore;

const FLUSH_CHUNK_SIZE: usize = 100;
const READ_BATCH_SIZE: usize = 100;

/// Distributed counter store: local counters, periodic flush to a shared
/// stream, and a reader that merges peers' counters into a per-host peer
/// table.
///
/// `incr_and_get` never blocks on the network (spec.md §5) - it only
/// touches the local revolving map and the peer table already
/// reconstructed from prior reads. Consistency is eventual: a remote
/// host's contribution lags by at most `2 * flush_interval`.
pub struct SyncedMemoryStore {
    local: RevolvingMap<i64>,
    peers: RevolvingMap<Arc<RevolvingMap<i64>>>,
    host: String,
    cancel: CancellationToken,
    flush_handle: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    reader_handle: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl SyncedMemoryStore {
    /// Connects to Redis at `remote.connection_url()` and constructs a
    /// store whose stream is `sync.stream_name` on that connection - the
    /// production entry point, wiring [`RemoteConfig`] and [`SyncConfig`]
    /// together the way a dispatch shell would at startup.
    pub async fn connect(remote: &RemoteConfig, sync: SyncConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(remote.connection_url())
            .map_err(|e| StoreError::RemoteHandshake(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::RemoteHandshake(e.to_string()))?;
        let stream = Arc::new(RedisStream::new(conn, sync.stream_name.clone()));
        Self::new(stream, sync).await
    }

    /// Constructs a new store, posting a sentinel `{ping: pong}` entry to
    /// obtain a fresh cursor anchored at the current stream head. This is
    /// blocking and fatal on failure (spec.md §4.6, §7.2): without a
    /// cursor the reader task has no bound on the peer state it
    /// reconstructs.
    pub async fn new(
        stream: Arc<dyn CounterStream>,
        config: SyncConfig,
    ) -> Result<Self, StoreError> {
        let ping_fields = vec![("ping".to_string(), "pong".to_string())];
        let cursor = stream
            .append(&ping_fields)
            .await
            .map_err(|e| StoreError::StreamInit(e.to_string()))?;

        let local = RevolvingMap::new(config.max_ttl);
        let peers: RevolvingMap<Arc<RevolvingMap<i64>>> = RevolvingMap::new(config.max_ttl);
        let cancel = CancellationToken::new();

        let flush_handle = spawn_flush_task(
            stream.clone(),
            local.clone(),
            config.host.clone(),
            config.flush_interval,
            cancel.clone(),
        );
        let reader_handle = spawn_reader_task(
            stream,
            peers.clone(),
            config.host.clone(),
            config.flush_interval,
            config.max_ttl,
            cursor,
            cancel.clone(),
        );

        Ok(Self {
            local,
            peers,
            host: config.host,
            cancel,
            flush_handle: std::sync::Mutex::new(Some(flush_handle)),
            reader_handle: std::sync::Mutex::new(Some(reader_handle)),
        })
    }

    /// Sum of every known peer's last-flushed value for `key`; the
    /// estimated global count is this plus the local contribution (spec.md
    /// §3's `sum_peers(K) + local(K)`).
    async fn sum_peers(&self, key: &str) -> i64 {
        match self.peers.get(key).await {
            Some(host_map) => {
                let mut total = 0;
                for host in host_map.keys().await {
                    total += host_map.get_int(&host).await.unwrap_or(0);
                }
                total
            }
            None => 0,
        }
    }

    /// Identifier this node advertises in its own flushes.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Stops the flush and reader tasks and waits for them to exit. There
    /// is no graceful drain of in-flight local counts (spec.md §5) - this
    /// only stops future flush/read ticks.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.local.shutdown().await;
        self.peers.shutdown().await;
        if let Some(h) = self.flush_handle.lock().expect("lock poisoned").take() {
            let _ = h.await;
        }
        if let Some(h) = self.reader_handle.lock().expect("lock poisoned").take() {
            let _ = h.await;
        }
    }
}

#[async_trait]
impl CounterStore for SyncedMemoryStore {
    async fn incr_and_get(&self, key: &str) -> i64 {
        let current = self.local.get(key).await.unwrap_or(0);
        let peer_sum = self.sum_peers(key).await;
        let next = current + 1;
        self.local.put(key, next).await;
        next + peer_sum
    }
}

#[tracing::instrument(skip(stream, local, cancel))]
fn spawn_flush_task(
    stream: Arc<dyn CounterStream>,
    local: RevolvingMap<i64>,
    host: String,
    flush_interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(flush_interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    flush_once(&stream, &local, &host).await;
                }
            }
        }
    })
}

async fn flush_once(stream: &Arc<dyn CounterStream>, local: &RevolvingMap<i64>, host: &str) {
    let snapshot = local.snapshot().await;
    if snapshot.is_empty() {
        return;
    }

    let mut pairs: Vec<(String, i64)> = snapshot.into_iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let chunks: Vec<Vec<(String, String)>> = pairs
        .chunks(FLUSH_CHUNK_SIZE)
        .map(|chunk| {
            let mut fields = Vec::with_capacity(chunk.len() + 1);
            fields.push(("host".to_string(), host.to_string()));
            fields.extend(
                chunk
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_string())),
            );
            fields
        })
        .collect();

    if let Err(err) = stream.append_batch(&chunks).await {
        tracing::warn!(error = %err, "flush failed; local counters will be retried next tick");
        return;
    }
    tracing::debug!(chunks = chunks.len(), "flush completed");
}

#[allow(clippy::too_many_arguments)]
#[tracing::instrument(skip(stream, peers, cancel))]
fn spawn_reader_task(
    stream: Arc<dyn CounterStream>,
    peers: RevolvingMap<Arc<RevolvingMap<i64>>>,
    self_host: String,
    flush_interval: Duration,
    peer_max_ttl: Duration,
    initial_cursor: String,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut cursor = initial_cursor;
        let mut ticker = tokio::time::interval(flush_interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    cursor = read_once(&stream, &peers, &self_host, peer_max_ttl, cursor).await;
                }
            }
        }
    })
}

async fn read_once(
    stream: &Arc<dyn CounterStream>,
    peers: &RevolvingMap<Arc<RevolvingMap<i64>>>,
    self_host: &str,
    peer_max_ttl: Duration,
    cursor: String,
) -> String {
    let entries = match stream.read_after(&cursor, READ_BATCH_SIZE).await {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(error = %err, "reading from stream failed; peer state may be stale");
            return cursor;
        }
    };

    if entries.is_empty() {
        return cursor;
    }

    let mut new_cursor = cursor;
    for entry in &entries {
        new_cursor = entry.id.clone();

        let host = match entry.fields.iter().find(|(field, _)| field == "host") {
            Some((_, host)) => host,
            None => {
                // Structural error (spec.md §7.4): entry without a `host`
                // field is skipped entirely.
                tracing::debug!(entry = %entry.id, "stream entry missing host field, skipping");
                continue;
            }
        };

        if host == self_host {
            // A node never treats its own flushes as peer data.
            continue;
        }

        for (field, value) in &entry.fields {
            if field == "host" {
                continue;
            }
            match value.parse::<i64>() {
                Ok(count) => {
                    let host_map = match peers.get(field).await {
                        Some(existing) => existing,
                        None => {
                            let fresh = Arc::new(RevolvingMap::new(peer_max_ttl));
                            peers.put(field.clone(), fresh.clone()).await;
                            fresh
                        }
                    };
                    host_map.put_int(host.clone(), count).await;
                }
                Err(_) => {
                    // Type-conversion error (spec.md §7.3): logged and
                    // skipped; the next flush from this host heals it.
                    tracing::debug!(key = %field, %host, raw = %value, "could not parse peer value as integer, skipping");
                }
            }
        }
    }

    new_cursor
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use crate::remote_backend::BackendResult;
    use crate::remote_backend::StreamEntry;

    /// An in-process stand-in for a shared append-only stream, letting
    /// multiple `SyncedMemoryStore` instances in the same process
    /// exercise the real flush/read protocol without a live Redis.
    #[derive(Default)]
    struct FakeStream {
        entries: StdMutex<Vec<StreamEntry>>,
        next_id: StdMutex<u64>,
    }

    impl FakeStream {
        fn next_id(&self) -> String {
            let mut id = self.next_id.lock().unwrap();
            *id += 1;
            format!("{id}-0")
        }
    }

    #[async_trait]
    impl CounterStream for FakeStream {
        async fn append(&self, fields: &[(String, String)]) -> BackendResult<String> {
            let id = self.next_id();
            self.entries.lock().unwrap().push(StreamEntry {
                id: id.clone(),
                fields: fields.to_vec(),
            });
            Ok(id)
        }

        async fn append_batch(&self, entries: &[Vec<(String, String)>]) -> BackendResult<()> {
            for fields in entries {
                self.append(fields).await?;
            }
            Ok(())
        }

        async fn read_after(&self, cursor: &str, max_count: usize) -> BackendResult<Vec<StreamEntry>> {
            let entries = self.entries.lock().unwrap();
            let start = if cursor.is_empty() {
                0
            } else {
                entries
                    .iter()
                    .position(|e| e.id == cursor)
                    .map(|idx| idx + 1)
                    .unwrap_or(entries.len())
            };
            Ok(entries[start..].iter().take(max_count).cloned().collect())
        }
    }

    fn config(host: &str, flush_interval: Duration) -> SyncConfig {
        SyncConfig::new(Duration::from_secs(600), flush_interval).with_host(host)
    }

    #[tokio::test(start_paused = true)]
    async fn local_increments_are_reflected_before_any_flush() {
        let stream = Arc::new(FakeStream::default());
        let store = SyncedMemoryStore::new(stream, config("h1", Duration::from_secs(10)))
            .await
            .unwrap();

        assert_eq!(store.incr_and_get("k").await, 1);
        assert_eq!(store.incr_and_get("k").await, 2);

        store.shutdown().await;
    }

    /// spec.md §8 scenario 2: two hosts converge within `2 * FlushInterval`.
    #[tokio::test(start_paused = true)]
    async fn two_hosts_converge_after_two_flush_intervals() {
        let stream: Arc<FakeStream> = Arc::new(FakeStream::default());
        let flush_interval = Duration::from_secs(1);

        let l1 = SyncedMemoryStore::new(
            stream.clone() as Arc<dyn CounterStream>,
            config("H1", flush_interval),
        )
        .await
        .unwrap();
        let l2 = SyncedMemoryStore::new(
            stream.clone() as Arc<dyn CounterStream>,
            config("H2", flush_interval),
        )
        .await
        .unwrap();

        assert_eq!(l1.incr_and_get("k").await, 1);
        assert_eq!(l2.incr_and_get("k").await, 1);

        // After >= 2 * flush_interval, each node should have flushed once
        // and read the other's flush once.
        tokio::time::advance(flush_interval * 3).await;

        assert_eq!(l1.incr_and_get("k").await, 3); // 2 local + 1 peer
        assert_eq!(l2.incr_and_get("k").await, 3); // 2 local + 1 peer

        l1.shutdown().await;
        l2.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn a_node_never_counts_its_own_flush_as_peer_data() {
        let stream: Arc<FakeStream> = Arc::new(FakeStream::default());
        let flush_interval = Duration::from_secs(1);
        let store = SyncedMemoryStore::new(
            stream as Arc<dyn CounterStream>,
            config("only-host", flush_interval),
        )
        .await
        .unwrap();

        store.incr_and_get("k").await;
        tokio::time::advance(flush_interval * 3).await;

        // No peer ever flushed, so the count is still just the local one.
        assert_eq!(store.incr_and_get("k").await, 2);
        store.shutdown().await;
    }
}
