//! Store contract (component G).
//!
//! The narrow interface every counter store satisfies, keeping the
//! rule-dispatch shell (out of scope here) store-agnostic: it can swap
//! [`crate::memory_store::MemoryStore`], [`crate::remote_store::RemoteStore`]
//! or [`crate::synced_store::SyncedMemoryStore`] in without caring which one
//! it's talking to.

use async_trait::async_trait;

/// The single operation a dispatch shell calls into the counter engine.
///
/// Returns the post-increment count for `key`, which the caller compares
/// against a rule's quota. Never fails (spec.md §7): transient backend
/// errors are absorbed into degrade-open behavior by the concrete store,
/// not surfaced here.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn incr_and_get(&self, key: &str) -> i64;
}
