//! Configuration (ambient, `SPEC_FULL.md` §D).

use std::time::Duration;

/// Connection parameters for the remote backend, mirroring
/// `original_source/src/cache/redis.go`'s `RedisConfig`/`DevConfig`.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

impl RemoteConfig {
    /// Reads `REDIS_HOST` (falling back to `127.0.0.1`); every other field
    /// takes its default.
    pub fn from_env() -> Self {
        let host = std::env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        Self {
            host,
            ..Self::default()
        }
    }

    /// Constructs the `redis://` connection string this config describes.
    pub fn connection_url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{password}@{host}:{port}/{db}",
                host = self.host,
                port = self.port,
                db = self.db
            ),
            None => format!(
                "redis://{host}:{port}/{db}",
                host = self.host,
                port = self.port,
                db = self.db
            ),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            db: 0,
        }
    }
}

/// Parameters for [`crate::synced_store::SyncedMemoryStore`], mirroring
/// `original_source/src/cache/synced_memory.go`'s `SyncMemoryConfig`.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Revolving-map TTL for both the local counters and the peer table;
    /// `cleanup_interval` is derived as `2 * max_ttl`.
    pub max_ttl: Duration,
    /// Period on which the flush and reader tasks run.
    pub flush_interval: Duration,
    /// Identifier this node advertises in its own flushes. Defaults to
    /// [`crate::host::advertised_host`] when built via [`SyncConfig::new`].
    pub host: String,
    /// Append-only stream key all participating nodes share. The original
    /// source hardcodes a single global name (`"go-throttler"`); kept
    /// configurable here so tests can isolate streams per case.
    pub stream_name: String,
}

impl SyncConfig {
    pub fn new(max_ttl: Duration, flush_interval: Duration) -> Self {
        Self {
            max_ttl,
            flush_interval,
            host: crate::host::advertised_host(),
            stream_name: Self::default_stream_name().to_string(),
        }
    }

    pub fn with_stream_name(mut self, stream_name: impl Into<String>) -> Self {
        self.stream_name = stream_name.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn default_stream_name() -> &'static str {
        "go-throttler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_url_without_password() {
        let cfg = RemoteConfig::default();
        assert_eq!(cfg.connection_url(), "redis://127.0.0.1:6379/0");
    }

    #[test]
    fn connection_url_with_password() {
        let cfg = RemoteConfig {
            password: Some("s3cret".to_string()),
            ..RemoteConfig::default()
        };
        assert_eq!(cfg.connection_url(), "redis://:s3cret@127.0.0.1:6379/0");
    }
}
