//! Cache storage traits

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::fetch::{CacheEntryKey, Response};
use crate::domain::DomainError;

/// A named set of request -> response entries
#[async_trait]
pub trait CachePartition: Send + Sync + Debug {
    /// Partition name, including its version tag
    fn name(&self) -> &str;

    /// Looks up an entry; a miss is `Ok(None)`
    async fn lookup(&self, key: &CacheEntryKey) -> Result<Option<Response>, DomainError>;

    /// Stores a response, replacing any previous entry for the key.
    ///
    /// Writing through a handle whose partition was deleted registers the
    /// partition again, last in open order, holding only the new entry.
    async fn put(&self, key: CacheEntryKey, response: Response) -> Result<(), DomainError>;

    /// Removes an entry
    async fn delete(&self, key: &CacheEntryKey) -> Result<bool, DomainError>;

    /// Lists the keys currently stored
    async fn keys(&self) -> Result<Vec<CacheEntryKey>, DomainError>;
}

/// The set of partitions available to the gateway
#[async_trait]
pub trait CacheStorage: Send + Sync + Debug {
    /// Opens a partition, creating it if absent
    async fn open(&self, name: &str) -> Result<Arc<dyn CachePartition>, DomainError>;

    /// Checks whether a partition exists
    async fn has(&self, name: &str) -> Result<bool, DomainError>;

    /// Removes a partition and all its entries
    async fn delete(&self, name: &str) -> Result<bool, DomainError>;

    /// Lists partition names
    async fn keys(&self) -> Result<Vec<String>, DomainError>;

    /// Searches every partition, the most recently opened first
    async fn match_request(&self, key: &CacheEntryKey) -> Result<Option<Response>, DomainError>;

    /// Deletes every partition, returning how many were removed
    async fn clear(&self) -> Result<usize, DomainError> {
        let mut deleted = 0;

        for name in self.keys().await? {
            if self.delete(&name).await? {
                deleted += 1;
            }
        }

        Ok(deleted)
    }
}
