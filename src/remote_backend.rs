//! Remote/stream backend abstraction (`SPEC_FULL.md` §G).
//!
//! spec.md §6 states the remote-service requirements as an interface
//! without naming a Rust type. [`RemoteBackend`] is the crate-internal
//! extension point [`crate::remote_store::RemoteStore`] is built against;
//! [`RedisBackend`] is the production implementation, and tests substitute
//! an in-process fake implementing the same trait.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

/// Error type returned by [`RemoteBackend`] operations.
///
/// Deliberately thin: callers (`RemoteStore`) only ever log it and degrade
/// open, never propagate it (spec.md §7.1).
#[derive(Debug, thiserror::Error)]
#[error("remote backend error: {0}")]
pub struct BackendError(String);

impl From<redis::RedisError> for BackendError {
    fn from(err: redis::RedisError) -> Self {
        BackendError(err.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Atomic-increment key/value service consumed by [`crate::remote_store`]
/// and [`crate::synced_store`]'s flush pipeline.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Tests existence of `key`, returning its stored value if present.
    async fn get(&self, key: &str) -> BackendResult<Option<String>>;

    /// Sets `key` to `value` with `ttl` only if `key` is currently absent.
    /// Returns whether the set took effect.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> BackendResult<bool>;

    /// Atomically increments `key` (creating it at 1 if absent) and
    /// returns the post-increment value.
    async fn incr(&self, key: &str) -> BackendResult<i64>;
}

/// Redis-backed [`RemoteBackend`], using a pooled, auto-reconnecting
/// `ConnectionManager` (the `redis` crate's async client).
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    pub async fn connect(connection_url: &str) -> BackendResult<Self> {
        let client = redis::Client::open(connection_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl RemoteBackend for RedisBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> BackendResult<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn incr(&self, key: &str) -> BackendResult<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(key, 1).await?;
        Ok(value)
    }
}

/// Append-only stream consumed by [`crate::synced_store::SyncedMemoryStore`].
#[async_trait]
pub trait CounterStream: Send + Sync {
    /// Appends one entry with the given field/value pairs, returning the
    /// service-assigned entry ID.
    async fn append(&self, fields: &[(String, String)]) -> BackendResult<String>;

    /// Reads up to `max_count` entries strictly after `cursor`, in producer
    /// order. Returns the entries and, if any were returned, the ID of the
    /// last one (the new cursor).
    async fn read_after(
        &self,
        cursor: &str,
        max_count: usize,
    ) -> BackendResult<Vec<StreamEntry>>;

    /// Appends every entry in `entries`, all-or-nothing from the caller's
    /// point of view (spec.md §4.6: "pipelined batch so all chunks of one
    /// flush are written atomically from the node's point of view").
    ///
    /// The default implementation appends sequentially, which is correct
    /// but not atomic; [`RedisStream`] overrides it with a real pipeline.
    async fn append_batch(&self, entries: &[Vec<(String, String)>]) -> BackendResult<()> {
        for fields in entries {
            self.append(fields).await?;
        }
        Ok(())
    }
}

/// One entry read from a [`CounterStream`].
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: String,
    pub fields: Vec<(String, String)>,
}

/// Redis Streams-backed [`CounterStream`] (`XADD`/`XREAD`).
pub struct RedisStream {
    conn: ConnectionManager,
    stream_name: String,
}

impl RedisStream {
    pub fn new(conn: ConnectionManager, stream_name: impl Into<String>) -> Self {
        Self {
            conn,
            stream_name: stream_name.into(),
        }
    }
}

#[async_trait]
impl CounterStream for RedisStream {
    async fn append(&self, fields: &[(String, String)]) -> BackendResult<String> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("XADD");
        cmd.arg(&self.stream_name).arg("*");
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }
        let id: String = cmd.query_async(&mut conn).await?;
        Ok(id)
    }

    async fn append_batch(&self, entries: &[Vec<(String, String)>]) -> BackendResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for fields in entries {
            let mut cmd = redis::cmd("XADD");
            cmd.arg(&self.stream_name).arg("*");
            for (field, value) in fields {
                cmd.arg(field).arg(value);
            }
            pipe.add_command(cmd);
        }
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn read_after(
        &self,
        cursor: &str,
        max_count: usize,
    ) -> BackendResult<Vec<StreamEntry>> {
        let mut conn = self.conn.clone();
        let reply: redis::streams::StreamReadReply = redis::cmd("XREAD")
            .arg("COUNT")
            .arg(max_count)
            .arg("STREAMS")
            .arg(&self.stream_name)
            .arg(cursor)
            .query_async(&mut conn)
            .await?;

        let mut entries = Vec::new();
        for key in reply.keys {
            for entry in key.ids {
                let fields = entry
                    .map
                    .into_iter()
                    .filter_map(|(field, value)| {
                        redis::from_redis_value::<String>(&value)
                            .ok()
                            .map(|value| (field, value))
                    })
                    .collect();
                entries.push(StreamEntry {
                    id: entry.id,
                    fields,
                });
            }
        }
        Ok(entries)
    }
}
