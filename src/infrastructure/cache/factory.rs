//! Cache storage factory for runtime backend selection

use std::sync::Arc;

use crate::domain::cache::CacheStorage;
use crate::domain::DomainError;

use super::in_memory::InMemoryCacheStorage;
use super::redis::{RedisCacheConfig, RedisCacheStorage};

/// Supported storage backends
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CacheType {
    /// Process-local storage using moka
    #[default]
    InMemory,
    /// Redis-backed storage
    Redis,
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheType::InMemory => write!(f, "in_memory"),
            CacheType::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for CacheType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(CacheType::InMemory),
            "redis" => Ok(CacheType::Redis),
            _ => Err(DomainError::configuration(format!(
                "Unknown cache backend: {}. Valid backends: in_memory, redis",
                s
            ))),
        }
    }
}

/// Configuration for the storage factory
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    pub cache_type: CacheType,
    /// Required for the Redis backend
    pub redis_url: Option<String>,
    pub key_prefix: Option<String>,
}

impl CacheConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            cache_type: CacheType::Redis,
            redis_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

/// Creates cache storage backends
#[derive(Debug, Default)]
pub struct CacheFactory;

impl CacheFactory {
    pub fn new() -> Self {
        Self
    }

    pub async fn create(&self, config: &CacheConfig) -> Result<Arc<dyn CacheStorage>, DomainError> {
        match config.cache_type {
            CacheType::InMemory => Ok(Arc::new(InMemoryCacheStorage::new())),
            CacheType::Redis => {
                let url = config.redis_url.clone().ok_or_else(|| {
                    DomainError::configuration("Redis URL is required for the redis cache backend")
                })?;

                let mut redis_config = RedisCacheConfig::new(url);

                if let Some(prefix) = &config.key_prefix {
                    redis_config = redis_config.with_key_prefix(prefix.clone());
                }

                Ok(Arc::new(RedisCacheStorage::new(redis_config).await?))
            }
        }
    }
}
