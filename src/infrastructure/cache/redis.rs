//! Redis cache storage
//!
//! Layout under the configured key prefix:
//! - `<prefix>:partitions` is a sorted set of partition names scored by open sequence
//! - `<prefix>:partition:<name>` is a hash of cache key -> JSON `StoredResponse`
//! - `<prefix>:open_seq` is the counter that orders opens

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::domain::cache::{CachePartition, CacheStorage};
use crate::domain::fetch::{CacheEntryKey, Response, StoredResponse};
use crate::domain::DomainError;

/// Configuration for Redis storage
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "pfm-sw".to_string(),
        }
    }
}

impl RedisCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

#[derive(Debug, Clone)]
struct RedisKeys {
    prefix: String,
}

impl RedisKeys {
    fn index(&self) -> String {
        format!("{}:partitions", self.prefix)
    }

    fn sequence(&self) -> String {
        format!("{}:open_seq", self.prefix)
    }

    fn partition(&self, name: &str) -> String {
        format!("{}:partition:{}", self.prefix, name)
    }
}

fn redis_error(action: &str, e: redis::RedisError) -> DomainError {
    DomainError::cache(format!("Failed to {}: {}", action, e))
}

/// Shared by the storage and every partition handle it opens
struct RedisBackend {
    connection: ConnectionManager,
    keys: RedisKeys,
}

impl RedisBackend {
    fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    async fn next_sequence(&self) -> Result<i64, DomainError> {
        let mut conn = self.connection();
        conn.incr(self.keys.sequence(), 1)
            .await
            .map_err(|e| redis_error("advance open sequence", e))
    }
}

/// One partition stored as a Redis hash
pub struct RedisPartition {
    name: String,
    hash_key: String,
    backend: Arc<RedisBackend>,
}

impl fmt::Debug for RedisPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisPartition")
            .field("name", &self.name)
            .field("hash_key", &self.hash_key)
            .finish()
    }
}

#[async_trait]
impl CachePartition for RedisPartition {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, key: &CacheEntryKey) -> Result<Option<Response>, DomainError> {
        let mut conn = self.backend.connection();

        let raw: Option<String> = conn
            .hget(&self.hash_key, key.as_str())
            .await
            .map_err(|e| redis_error(&format!("read '{}'", key), e))?;

        match raw {
            Some(raw) => {
                let snapshot: StoredResponse = serde_json::from_str(&raw).map_err(|e| {
                    DomainError::cache(format!("Corrupt cache entry '{}': {}", key, e))
                })?;
                Response::from_snapshot(snapshot).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: CacheEntryKey, response: Response) -> Result<(), DomainError> {
        let raw = serde_json::to_string(&response.into_snapshot())
            .map_err(|e| DomainError::cache(format!("Failed to serialize response: {}", e)))?;

        let sequence = self.backend.next_sequence().await?;
        let mut conn = self.backend.connection();

        // Re-register the partition if it was deleted while this handle was held
        let _: () = redis::pipe()
            .atomic()
            .hset(&self.hash_key, key.as_str(), raw)
            .ignore()
            .cmd("ZADD")
            .arg(self.backend.keys.index())
            .arg("NX")
            .arg(sequence)
            .arg(&self.name)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error(&format!("write '{}'", key), e))?;

        Ok(())
    }

    async fn delete(&self, key: &CacheEntryKey) -> Result<bool, DomainError> {
        let mut conn = self.backend.connection();

        let removed: i64 = conn
            .hdel(&self.hash_key, key.as_str())
            .await
            .map_err(|e| redis_error(&format!("delete '{}'", key), e))?;

        Ok(removed > 0)
    }

    async fn keys(&self) -> Result<Vec<CacheEntryKey>, DomainError> {
        let mut conn = self.backend.connection();

        let raw: Vec<String> = conn
            .hkeys(&self.hash_key)
            .await
            .map_err(|e| redis_error(&format!("list keys of '{}'", self.name), e))?;

        let mut keys = raw
            .iter()
            .map(|k| CacheEntryKey::parse(k))
            .collect::<Result<Vec<_>, _>>()?;
        keys.sort();

        Ok(keys)
    }
}

/// Partition set persisted in Redis, shared across gateway restarts
pub struct RedisCacheStorage {
    backend: Arc<RedisBackend>,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCacheStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCacheStorage")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCacheStorage {
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::cache(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            backend: Arc::new(RedisBackend {
                connection,
                keys: RedisKeys {
                    prefix: config.key_prefix.clone(),
                },
            }),
            config,
        })
    }

    fn partition(&self, name: &str) -> RedisPartition {
        RedisPartition {
            name: name.to_string(),
            hash_key: self.backend.keys.partition(name),
            backend: self.backend.clone(),
        }
    }
}

#[async_trait]
impl CacheStorage for RedisCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn CachePartition>, DomainError> {
        let sequence = self.backend.next_sequence().await?;
        let mut conn = self.backend.connection();

        let _: () = conn
            .zadd(self.backend.keys.index(), name, sequence)
            .await
            .map_err(|e| redis_error(&format!("open partition '{}'", name), e))?;

        Ok(Arc::new(self.partition(name)))
    }

    async fn has(&self, name: &str) -> Result<bool, DomainError> {
        let mut conn = self.backend.connection();

        let score: Option<f64> = conn
            .zscore(self.backend.keys.index(), name)
            .await
            .map_err(|e| redis_error(&format!("check partition '{}'", name), e))?;

        Ok(score.is_some())
    }

    async fn delete(&self, name: &str) -> Result<bool, DomainError> {
        let mut conn = self.backend.connection();

        let (_, removed): (i64, i64) = redis::pipe()
            .atomic()
            .del(self.backend.keys.partition(name))
            .zrem(self.backend.keys.index(), name)
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error(&format!("delete partition '{}'", name), e))?;

        Ok(removed > 0)
    }

    async fn keys(&self) -> Result<Vec<String>, DomainError> {
        let mut conn = self.backend.connection();

        conn.zrange(self.backend.keys.index(), 0, -1)
            .await
            .map_err(|e| redis_error("list partitions", e))
    }

    async fn match_request(&self, key: &CacheEntryKey) -> Result<Option<Response>, DomainError> {
        let mut conn = self.backend.connection();

        let names: Vec<String> = conn
            .zrevrange(self.backend.keys.index(), 0, -1)
            .await
            .map_err(|e| redis_error("list partitions", e))?;

        for name in names {
            if let Some(response) = self.partition(&name).lookup(key).await? {
                return Ok(Some(response));
            }
        }

        Ok(None)
    }
}
