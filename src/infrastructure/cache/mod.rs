//! Cache infrastructure - storage backends

mod factory;
mod in_memory;
mod redis;

pub use factory::{CacheConfig, CacheFactory, CacheType};
pub use in_memory::{InMemoryCacheStorage, InMemoryPartition};
pub use redis::{RedisCacheConfig, RedisCacheStorage, RedisPartition};
