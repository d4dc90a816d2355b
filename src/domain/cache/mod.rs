//! Cache domain - versioned request/response partitions

mod names;
mod repository;

pub use names::{PartitionKind, PartitionNames};
pub use repository::{CachePartition, CacheStorage};

#[cfg(test)]
pub use repository::mock::MockCacheStorage;
