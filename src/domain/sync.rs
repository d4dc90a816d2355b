//! Reconnect refresh of key API endpoints

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use super::cache::CacheStorage;
use super::clients::{ClientEvent, Clients};
use super::fetch::{FetchRequest, Fetcher};
use super::DomainError;

/// Outcome of one background refresh
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub refreshed: Vec<String>,
    pub failed: Vec<String>,
    pub timestamp: i64,
}

/// Refetches the sync endpoints into the api partition and notifies clients
pub struct SyncBridge {
    endpoints: Vec<Url>,
    fetcher: Arc<dyn Fetcher>,
    storage: Arc<dyn CacheStorage>,
    api_partition: String,
}

impl std::fmt::Debug for SyncBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncBridge")
            .field("endpoints", &self.endpoints)
            .field("api_partition", &self.api_partition)
            .finish()
    }
}

impl SyncBridge {
    pub fn new(
        endpoints: Vec<Url>,
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn CacheStorage>,
        api_partition: impl Into<String>,
    ) -> Self {
        Self {
            endpoints,
            fetcher,
            storage,
            api_partition: api_partition.into(),
        }
    }

    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }

    /// Refreshes every endpoint concurrently.
    ///
    /// Individual failures are collected in the report; clients are notified
    /// once all attempts have settled.
    pub async fn run(&self, clients: &Clients) -> SyncReport {
        let results = join_all(self.endpoints.iter().map(|url| self.refresh(url))).await;

        let mut report = SyncReport {
            timestamp: Utc::now().timestamp_millis(),
            ..Default::default()
        };

        for (url, result) in self.endpoints.iter().zip(results) {
            match result {
                Ok(()) => report.refreshed.push(url.to_string()),
                Err(e) => {
                    warn!(url = %url, error = %e, "Background refresh failed");
                    report.failed.push(url.to_string());
                }
            }
        }

        info!(
            refreshed = report.refreshed.len(),
            failed = report.failed.len(),
            "Background sync finished"
        );

        clients.broadcast(ClientEvent::SyncComplete {
            timestamp: report.timestamp,
            refreshed: report.refreshed.len(),
            failed: report.failed.len(),
        });

        report
    }

    async fn refresh(&self, url: &Url) -> Result<(), DomainError> {
        let request = FetchRequest::get(url.clone());
        let response = self.fetcher.fetch(&request).await?;

        if !response.is_success() {
            return Err(DomainError::network(
                url.as_str(),
                format!("Unexpected status {}", response.status()),
            ));
        }

        let key = request
            .cache_key()
            .ok_or_else(|| DomainError::internal("GET request without a cache key"))?;

        let partition = self.storage.open(&self.api_partition).await?;
        partition.put(key, response).await
    }
}
