//! Application state shared across request handlers

use std::sync::Arc;

use url::Url;

use crate::domain::{CacheStorage, DomainError, Fetcher, Registration, ServiceWorker, WorkerConfig};

/// Produces the configuration for the next worker version to deploy
pub type WorkerConfigSource = Arc<dyn Fn() -> Result<WorkerConfig, DomainError> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub registration: Arc<Registration>,
    pub network: Arc<dyn Fetcher>,
    pub storage: Arc<dyn CacheStorage>,
    /// Origin the browser sees; relative request targets resolve against it
    pub public_origin: Url,
    pub worker_config: WorkerConfigSource,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("registration", &self.registration)
            .field("public_origin", &self.public_origin.as_str())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(
        registration: Arc<Registration>,
        network: Arc<dyn Fetcher>,
        storage: Arc<dyn CacheStorage>,
        public_origin: Url,
        worker_config: WorkerConfigSource,
    ) -> Self {
        Self {
            registration,
            network,
            storage,
            public_origin,
            worker_config,
        }
    }

    /// Builds a worker from the current configuration and registers it
    pub async fn deploy(&self) -> Result<Arc<ServiceWorker>, DomainError> {
        let config = (self.worker_config)()?;
        let worker = Arc::new(ServiceWorker::new(
            config,
            self.storage.clone(),
            self.network.clone(),
        )?);

        self.registration.register(worker.clone()).await?;

        Ok(worker)
    }
}
