//! In-memory cache storage using moka

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use tokio::sync::RwLock;

use crate::domain::cache::{CachePartition, CacheStorage};
use crate::domain::fetch::{CacheEntryKey, Response, StoredResponse};
use crate::domain::DomainError;

/// Entries of one partition. No capacity bound and no TTL: entries live
/// until they or their partition are deleted.
#[derive(Debug)]
struct PartitionEntries {
    name: String,
    entries: MokaCache<String, StoredResponse>,
}

impl PartitionEntries {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: MokaCache::builder().build(),
        }
    }
}

type Registry = Arc<RwLock<Vec<Arc<PartitionEntries>>>>;

/// Handle to a partition, resolved by name on every operation.
///
/// Once the partition is deleted, reads through the handle miss and the
/// next `put` registers the partition again.
#[derive(Debug)]
pub struct InMemoryPartition {
    name: String,
    registry: Registry,
}

impl InMemoryPartition {
    async fn resolve(&self) -> Option<Arc<PartitionEntries>> {
        self.registry
            .read()
            .await
            .iter()
            .find(|p| p.name == self.name)
            .cloned()
    }

    async fn resolve_or_register(&self) -> Arc<PartitionEntries> {
        if let Some(partition) = self.resolve().await {
            return partition;
        }

        let mut partitions = self.registry.write().await;
        if let Some(partition) = partitions.iter().find(|p| p.name == self.name) {
            return partition.clone();
        }

        let partition = Arc::new(PartitionEntries::new(&self.name));
        partitions.push(partition.clone());
        partition
    }
}

#[async_trait]
impl CachePartition for InMemoryPartition {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, key: &CacheEntryKey) -> Result<Option<Response>, DomainError> {
        let Some(partition) = self.resolve().await else {
            return Ok(None);
        };

        match partition.entries.get(key.as_str()).await {
            Some(snapshot) => Response::from_snapshot(snapshot).map(Some),
            None => Ok(None),
        }
    }

    async fn put(&self, key: CacheEntryKey, response: Response) -> Result<(), DomainError> {
        self.resolve_or_register()
            .await
            .entries
            .insert(key.as_str().to_string(), response.into_snapshot())
            .await;
        Ok(())
    }

    async fn delete(&self, key: &CacheEntryKey) -> Result<bool, DomainError> {
        match self.resolve().await {
            Some(partition) => Ok(partition.entries.remove(key.as_str()).await.is_some()),
            None => Ok(false),
        }
    }

    async fn keys(&self) -> Result<Vec<CacheEntryKey>, DomainError> {
        let Some(partition) = self.resolve().await else {
            return Ok(Vec::new());
        };
        partition.entries.run_pending_tasks().await;

        let mut keys = partition
            .entries
            .iter()
            .map(|(k, _)| CacheEntryKey::parse(k.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        keys.sort();

        Ok(keys)
    }
}

/// Process-local partition set, kept in open order
#[derive(Debug, Default)]
pub struct InMemoryCacheStorage {
    partitions: Registry,
}

impl InMemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, name: &str) -> InMemoryPartition {
        InMemoryPartition {
            name: name.to_string(),
            registry: self.partitions.clone(),
        }
    }
}

#[async_trait]
impl CacheStorage for InMemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn CachePartition>, DomainError> {
        let mut partitions = self.partitions.write().await;

        let partition = match partitions.iter().position(|p| p.name == name) {
            Some(index) => partitions.remove(index),
            None => Arc::new(PartitionEntries::new(name)),
        };
        partitions.push(partition);

        Ok(Arc::new(self.handle(name)))
    }

    async fn has(&self, name: &str) -> Result<bool, DomainError> {
        Ok(self.partitions.read().await.iter().any(|p| p.name == name))
    }

    async fn delete(&self, name: &str) -> Result<bool, DomainError> {
        let mut partitions = self.partitions.write().await;

        match partitions.iter().position(|p| p.name == name) {
            Some(index) => {
                let removed = partitions.remove(index);
                removed.entries.invalidate_all();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, DomainError> {
        Ok(self
            .partitions
            .read()
            .await
            .iter()
            .map(|p| p.name.clone())
            .collect())
    }

    async fn match_request(&self, key: &CacheEntryKey) -> Result<Option<Response>, DomainError> {
        let partitions: Vec<Arc<PartitionEntries>> =
            self.partitions.read().await.iter().rev().cloned().collect();

        for partition in partitions {
            if let Some(snapshot) = partition.entries.get(key.as_str()).await {
                return Response::from_snapshot(snapshot).map(Some);
            }
        }

        Ok(None)
    }
}
