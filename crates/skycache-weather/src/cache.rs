//! Cache client adapters.
//!
//! [`CacheStore`] is the seam the resolver talks to. Two implementations:
//! - [`RedisCache`]: production store over a shared, auto-reconnecting
//!   connection manager with bounded connect and response times
//! - [`MemoryCache`]: in-process map with per-entry expiry

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use skycache_core::CacheConfig;

use crate::error::CacheError;
use crate::location::CacheKey;

/// Result of a cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(Vec<u8>),
    Miss,
}

/// Key/value store with TTL support.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read an entry. Absent or expired entries are `Ok(CacheLookup::Miss)`.
    async fn get(&self, key: &CacheKey) -> Result<CacheLookup, CacheError>;

    /// Store an entry that expires after `ttl`.
    async fn set(&self, key: &CacheKey, payload: &[u8], ttl: Duration) -> Result<(), CacheError>;
}

/// Redis-backed cache.
///
/// Cloning is cheap; clones share one multiplexed connection.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    response_timeout: Duration,
}

impl RedisCache {
    /// Connect and verify the server answers `PING`.
    ///
    /// Fails with [`CacheError::Connection`] once `config.connect_deadline()`
    /// has passed, whatever the reconnect backoff is doing.
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let url = config
            .redis_url()
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        let client = redis::Client::open(url).map_err(connection_error)?;
        let manager_config = ConnectionManagerConfig::new()
            .set_number_of_retries(config.retries)
            .set_connection_timeout(config.connect_timeout())
            .set_response_timeout(config.response_timeout());

        let deadline = config.connect_deadline();
        let mut conn = tokio::time::timeout(
            deadline,
            ConnectionManager::new_with_config(client, manager_config),
        )
        .await
        .map_err(|_| {
            CacheError::Connection(format!(
                "no connection to {} within {:?}",
                config.addr, deadline
            ))
        })?
        .map_err(connection_error)?;

        let response_timeout = config.response_timeout();
        let pong: String = tokio::time::timeout(
            response_timeout,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| timed_out("PING", response_timeout))?
        .map_err(connection_error)?;

        tracing::info!("Redis connected at {} (db {}): {}", config.addr, config.db, pong);
        Ok(Self {
            conn,
            response_timeout,
        })
    }

    /// Release the connection. Other clones keep it alive until dropped.
    pub fn disconnect(self) {
        tracing::info!("Closing Redis connection");
        drop(self.conn);
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache").finish_non_exhaustive()
    }
}

fn connection_error(err: redis::RedisError) -> CacheError {
    CacheError::Connection(err.to_string())
}

fn timed_out(command: &str, after: Duration) -> CacheError {
    CacheError::Connection(format!("{} timed out after {:?}", command, after))
}

fn lookup_from(value: Option<Vec<u8>>) -> CacheLookup {
    match value {
        Some(bytes) => CacheLookup::Hit(bytes),
        None => CacheLookup::Miss,
    }
}

fn classify(err: redis::RedisError) -> CacheError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
        CacheError::Connection(err.to_string())
    } else {
        CacheError::Backend(err.to_string())
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &CacheKey) -> Result<CacheLookup, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> =
            tokio::time::timeout(self.response_timeout, conn.get(key.as_str()))
                .await
                .map_err(|_| timed_out("GET", self.response_timeout))?
                .map_err(classify)?;
        Ok(lookup_from(value))
    }

    async fn set(&self, key: &CacheKey, payload: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        // EX 0 is rejected by Redis
        let seconds = ttl.as_secs().max(1);
        let _: () = tokio::time::timeout(
            self.response_timeout,
            conn.set_ex(key.as_str(), payload, seconds),
        )
        .await
        .map_err(|_| timed_out("SETEX", self.response_timeout))?
        .map_err(classify)?;
        Ok(())
    }
}

struct MemoryEntry {
    payload: Vec<u8>,
    expires_at: Instant,
}

/// In-process cache with per-entry expiry.
///
/// Expired entries read as misses and are dropped lazily on access.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<CacheLookup, CacheError> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.get(key.as_str()) {
            Some(entry) if entry.expires_at > now => Ok(CacheLookup::Hit(entry.payload.clone())),
            Some(_) => {
                entries.remove(key.as_str());
                Ok(CacheLookup::Miss)
            }
            None => Ok(CacheLookup::Miss),
        }
    }

    async fn set(&self, key: &CacheKey, payload: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.entries.lock().insert(
            key.as_str().to_string(),
            MemoryEntry {
                payload: payload.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(location: &str) -> CacheKey {
        CacheKey::for_location(location).unwrap()
    }

    #[tokio::test]
    async fn test_memory_cache_miss_for_absent_key() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get(&key("paris")).await.unwrap(), CacheLookup::Miss);
    }

    #[tokio::test]
    async fn test_memory_cache_hit_after_set() {
        let cache = MemoryCache::new();
        cache
            .set(&key("paris"), b"{\"days\":[]}", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            cache.get(&key("Paris")).await.unwrap(),
            CacheLookup::Hit(b"{\"days\":[]}".to_vec())
        );
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_cache_entry_expires() {
        let cache = MemoryCache::new();
        cache
            .set(&key("oslo"), b"payload", Duration::from_millis(20))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get(&key("oslo")).await.unwrap(), CacheLookup::Miss);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_memory_cache_overwrite() {
        let cache = MemoryCache::new();
        let k = key("rome");
        cache.set(&k, b"first", Duration::from_secs(60)).await.unwrap();
        cache.set(&k, b"second", Duration::from_secs(60)).await.unwrap();

        assert_eq!(
            cache.get(&k).await.unwrap(),
            CacheLookup::Hit(b"second".to_vec())
        );
    }

    #[test]
    fn test_absent_redis_value_is_miss() {
        assert_eq!(lookup_from(None), CacheLookup::Miss);
        assert_eq!(
            lookup_from(Some(b"payload".to_vec())),
            CacheLookup::Hit(b"payload".to_vec())
        );
        // An empty string stored under the key is still a hit
        assert_eq!(lookup_from(Some(Vec::new())), CacheLookup::Hit(Vec::new()));
    }

    #[test]
    fn test_classify_transport_failures_as_connection() {
        let refused = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert!(matches!(classify(refused), CacheError::Connection(_)));

        let timeout = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "timed out",
        ));
        assert!(matches!(classify(timeout), CacheError::Connection(_)));

        let reset = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        assert!(matches!(classify(reset), CacheError::Connection(_)));
    }

    #[test]
    fn test_classify_server_replies_as_backend() {
        let wrong_type = redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "WRONGTYPE Operation against a key holding the wrong kind of value",
        ));
        match classify(wrong_type) {
            CacheError::Backend(msg) => assert!(msg.contains("WRONGTYPE")),
            other => panic!("expected backend error, got {:?}", other),
        }

        let server = redis::RedisError::from((redis::ErrorKind::ResponseError, "ERR unknown command"));
        assert!(matches!(classify(server), CacheError::Backend(_)));
    }

    #[tokio::test]
    async fn test_redis_connect_to_closed_port_fails_fast() {
        let config = CacheConfig {
            addr: "127.0.0.1:1".to_string(),
            connect_timeout_secs: 1,
            response_timeout_secs: 1,
            retries: 1,
            ..CacheConfig::default()
        };

        let started = Instant::now();
        let result = tokio::time::timeout(Duration::from_secs(10), RedisCache::connect(&config))
            .await
            .expect("connect must give up on its own");

        assert!(matches!(result, Err(CacheError::Connection(_))));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    #[ignore] // Run with a local Redis: cargo test -p skycache-weather -- --ignored
    async fn test_redis_round_trip() {
        let cache = RedisCache::connect(&CacheConfig::default()).await.unwrap();
        let k = key("skycache test location");

        cache.set(&k, b"payload", Duration::from_secs(5)).await.unwrap();
        assert_eq!(
            cache.get(&k).await.unwrap(),
            CacheLookup::Hit(b"payload".to_vec())
        );

        let absent = key("skycache test absent location");
        let mut conn = cache.conn.clone();
        let _: () = redis::cmd("DEL")
            .arg(absent.as_str())
            .query_async(&mut conn)
            .await
            .unwrap();
        assert_eq!(cache.get(&absent).await.unwrap(), CacheLookup::Miss);

        // A list under the key makes GET fail server-side
        let _: () = redis::cmd("LPUSH")
            .arg(absent.as_str())
            .arg("x")
            .query_async(&mut conn)
            .await
            .unwrap();
        assert!(matches!(cache.get(&absent).await, Err(CacheError::Backend(_))));
        let _: () = redis::cmd("DEL")
            .arg(absent.as_str())
            .query_async(&mut conn)
            .await
            .unwrap();

        cache.disconnect();
    }
}
