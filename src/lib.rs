//! # quota-core
//!
//! The counter engine behind a distributed API rate limiter: given a stream
//! of `(rule, client, resource)` events, decide whether a request would
//! breach a configured quota over a time window.
//!
//! This crate is deliberately narrow - it is the store layer only. Rule
//! loading, the dispatch shell that maps an incoming request to matching
//! rules, and the CLI/driver harness around it are out of scope; they are
//! expected to be thin callers of the single method every store exposes,
//! [`store::CounterStore::incr_and_get`].
//!
//! ## Layout
//!
//! * [`window`] - deterministic time-window keyer (component A).
//! * [`ttl_map`] - single-node lazily-expiring map (component B).
//! * [`revolving_map`] - dual-map bulk-expiry container (component C).
//! * [`memory_store`] - local counter store (component D).
//! * [`remote_store`] - Redis-backed counter store (component E).
//! * [`synced_store`] - distributed counter store with stream-based peer
//!   aggregation (component F, the distributed core).
//! * [`store`] - the narrow [`store::CounterStore`] contract all three
//!   variants satisfy (component G).
//! * [`key`] - fingerprint composer (component H).
//!
//! `config`, `host`, `error`, and `remote_backend` are ambient supporting
//! modules (connection/flush configuration, host discovery, the public
//! error type, and the Redis-backed trait implementations).

pub mod config;
pub mod error;
pub mod host;
pub mod key;
pub mod memory_store;
pub mod remote_backend;
pub mod remote_store;
pub mod revolving_map;
pub mod store;
pub mod synced_store;
pub mod ttl_map;
pub mod window;

pub use error::StoreError;
pub use key::make_key;
pub use memory_store::MemoryStore;
pub use remote_store::RemoteStore;
pub use store::CounterStore;
pub use synced_store::SyncedMemoryStore;
pub use window::get_time_window;
