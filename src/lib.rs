//! Personal finance offline gateway
//!
//! Sits in front of the finance web app and keeps it usable offline:
//! - Request classification (static assets, API calls, navigations)
//! - Per-class caching strategies over versioned cache partitions
//! - Worker version lifecycle with install, activation and eviction
//! - Background refresh of market data when connectivity returns

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use tracing::info;

use api::state::{AppState, WorkerConfigSource};
use domain::{CacheStorage, Clients, DomainError, Fetcher, Registration};
use infrastructure::{
    cache::CacheFactory,
    network::{HttpFetcher, UpstreamRewrite},
};

/// Builds the fetcher that reaches the upstream app and third-party hosts
pub fn create_fetcher(config: &AppConfig) -> anyhow::Result<Arc<dyn Fetcher>> {
    let rewrite = UpstreamRewrite::new(&config.public_origin()?, config.upstream_url()?)?;
    let fetcher = HttpFetcher::new(config.request_timeout())?.with_upstream(rewrite);

    Ok(Arc::new(fetcher))
}

/// Creates the application state from configuration. No worker is registered yet.
///
/// Each deploy re-reads the worker settings; the upstream section is fixed at startup.
pub async fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let storage: Arc<dyn CacheStorage> = CacheFactory::new().create(&config.cache_config()?).await?;
    let network = create_fetcher(config)?;

    info!(
        backend = %config.cache.backend,
        upstream = %config.upstream.url,
        public_origin = %config.upstream.public_origin,
        "Gateway state initialized"
    );

    let upstream = config.upstream.clone();
    let worker_config: WorkerConfigSource = Arc::new(move || {
        let mut fresh = AppConfig::load().map_err(|e| {
            DomainError::configuration(format!("Failed to reload configuration: {}", e))
        })?;
        fresh.upstream = upstream.clone();
        fresh.worker_config()
    });

    Ok(AppState::new(
        Arc::new(Registration::new(Clients::default())),
        network,
        storage,
        config.public_origin()?,
        worker_config,
    ))
}

/// Creates the application state from the layered configuration sources
pub async fn create_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::load().unwrap_or_default();
    create_app_state_with_config(&config).await
}
