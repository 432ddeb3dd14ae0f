use std::time::Duration;

use quota_core::CounterStore;
use quota_core::get_time_window;
use quota_core::make_key;
use quota_core::memory_store::MemoryStore;

/// Fires a burst of events for one (client, resource) pair against a rule
/// with quota=20, interval=10s, and reports which ones would have
/// breached - the same decision an excluded dispatch shell would make by
/// comparing `incr_and_get`'s return value to the rule's quota.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let quota = 20;
    let interval_secs = 10;
    let store = MemoryStore::new(Duration::from_secs(interval_secs));

    for i in 1..=30 {
        let window = get_time_window(interval_secs);
        let key = make_key(&window, "client-a", "api/call1", "cr1");
        let count = store.incr_and_get(&key).await;
        let verdict = if count > quota { "BREACH" } else { "ok" };
        println!("event {i:02} window={window} count={count:02} -> {verdict}");
    }

    store.shutdown().await;
}
