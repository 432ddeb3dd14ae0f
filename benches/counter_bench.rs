//! Throughput benchmarks for the three `CounterStore` variants.
//!
//! `spec.md` §1 targets "millions of events per limiter instance"; these
//! benchmarks measure single-threaded and concurrent `incr_and_get`
//! overhead for [`MemoryStore`] directly, and for [`RemoteStore`] against
//! an in-process fake backend (no live Redis needed to run these).
//! `SyncedMemoryStore`'s caller-visible path never touches the network
//! either (spec.md §5), so it is benchmarked the same way against a fake
//! stream.

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use criterion::Criterion;
use criterion::criterion_group;
use criterion::criterion_main;

use quota_core::CounterStore;
use quota_core::config::SyncConfig;
use quota_core::memory_store::MemoryStore;
use quota_core::remote_backend::BackendResult;
use quota_core::remote_backend::RemoteBackend;
use quota_core::remote_backend::StreamEntry;
use quota_core::remote_store::RemoteStore;
use quota_core::synced_store::SyncedMemoryStore;

/// In-memory stand-in for the Redis-backed `RemoteBackend`, so the
/// benchmark measures this crate's dispatch overhead rather than network
/// round trips.
#[derive(Default)]
struct LocalBackend {
    values: std::sync::Mutex<std::collections::HashMap<String, i64>>,
}

#[async_trait]
impl RemoteBackend for LocalBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).map(|v| v.to_string()))
    }

    async fn set_if_absent(&self, key: &str, _value: &str, _ttl: Duration) -> BackendResult<bool> {
        let mut values = self.values.lock().unwrap();
        if values.contains_key(key) {
            Ok(false)
        } else {
            values.insert(key.to_string(), 1);
            Ok(true)
        }
    }

    async fn incr(&self, key: &str) -> BackendResult<i64> {
        let mut values = self.values.lock().unwrap();
        let entry = values.entry(key.to_string()).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }
}

#[derive(Default)]
struct LocalStream {
    entries: std::sync::Mutex<Vec<StreamEntry>>,
    next_id: std::sync::Mutex<u64>,
}

#[async_trait]
impl quota_core::remote_backend::CounterStream for LocalStream {
    async fn append(&self, fields: &[(String, String)]) -> BackendResult<String> {
        let mut id_guard = self.next_id.lock().unwrap();
        *id_guard += 1;
        let id = format!("{}-0", *id_guard);
        self.entries.lock().unwrap().push(StreamEntry {
            id: id.clone(),
            fields: fields.to_vec(),
        });
        Ok(id)
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

fn bench_memory_store(c: &mut Criterion, rt: &tokio::runtime::Runtime) {
    let store = Arc::new(rt.block_on(async { MemoryStore::new(Duration::from_secs(60)) }));

    let mut group = c.benchmark_group("MemoryStore");
    group.bench_function("single-threaded", |b| {
        b.to_async(rt).iter(|| {
            let store = store.clone();
            async move {
                black_box(store.incr_and_get("bench_key").await);
            }
        });
    });
    group.finish();
}

fn bench_remote_store(c: &mut Criterion, rt: &tokio::runtime::Runtime) {
    let store = Arc::new(RemoteStore::with_backend(Arc::new(LocalBackend::default())));

    let mut group = c.benchmark_group("RemoteStore");
    group.bench_function("single-threaded-fake-backend", |b| {
        b.to_async(rt).iter(|| {
            let store = store.clone();
            async move {
                black_box(store.incr_and_get("bench_key").await);
            }
        });
    });
    group.finish();
}

fn bench_synced_store(c: &mut Criterion, rt: &tokio::runtime::Runtime) {
    let stream = Arc::new(LocalStream::default());
    let config = SyncConfig::new(Duration::from_secs(600), Duration::from_secs(3600))
        .with_host("bench-host");
    let store = Arc::new(
        rt.block_on(async { SyncedMemoryStore::new(stream, config).await.unwrap() }),
    );

    let mut group = c.benchmark_group("SyncedMemoryStore");
    group.bench_function("single-threaded-local-path", |b| {
        b.to_async(rt).iter(|| {
            let store = store.clone();
            async move {
                black_box(store.incr_and_get("bench_key").await);
            }
        });
    });
    group.finish();

    rt.block_on(async { store.shutdown().await });
}

fn run_all_benches(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build benchmark runtime");

    bench_memory_store(c, &rt);
    bench_remote_store(c, &rt);
    bench_synced_store(c, &rt);
}

criterion_group!(benches, run_all_benches);
criterion_main!(benches);
