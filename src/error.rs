//! Error types that cross the public API surface.
//!
//! Per the store contract (see [`crate::store::CounterStore`]), `incr_and_get`
//! never fails: transient backend errors are absorbed into degrade-open
//! behavior (logged, not propagated). The only failures a caller can observe
//! are construction-time failures, because a store that cannot reach a
//! consistent starting state should refuse to exist rather than silently
//! misbehave later.

/// Fatal errors raised only from store constructors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The synced-memory store could not obtain an initial stream cursor.
    ///
    /// Without a cursor the reader task has no anchor for the peer state it
    /// reconstructs, so construction is aborted rather than started in a
    /// degraded state.
    #[error("failed to obtain initial stream cursor: {0}")]
    StreamInit(String),

    /// The remote backend client could not be built (bad address, TLS
    /// config, etc).
    #[error("failed to establish remote backend connection: {0}")]
    RemoteHandshake(String),
}
