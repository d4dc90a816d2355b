//! One versioned worker: install, activate, fetch and message handling

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use metrics::counter;
use serde::Serialize;
use tracing::{error, info, warn};
use url::Url;

use super::message::{ControlMessage, ControlReply};
use super::state::WorkerState;
use super::WorkerConfig;
use crate::domain::cache::{CacheStorage, PartitionNames};
use crate::domain::classifier::{
    Classifier, ClassifierConfig, Interception, PassthroughReason, RequestClassification,
};
use crate::domain::clients::Clients;
use crate::domain::fetch::{CacheEntryKey, FetchRequest, Fetcher, Response};
use crate::domain::offline_page;
use crate::domain::strategy::StrategyDispatcher;
use crate::domain::sync::{SyncBridge, SyncReport};
use crate::domain::DomainError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallReport {
    pub version: String,
    pub precached: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivationReport {
    pub version: String,
    pub evicted: Vec<String>,
}

/// What the worker decided for one request
#[derive(Debug)]
pub enum FetchOutcome {
    Responded {
        classification: RequestClassification,
        response: Response,
    },
    /// The request must go to the network untouched
    Passthrough(PassthroughReason),
}

pub struct ServiceWorker {
    version: String,
    partitions: PartitionNames,
    classifier: Classifier,
    dispatcher: StrategyDispatcher,
    sync: SyncBridge,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    precache: Vec<Url>,
    offline_key: CacheEntryKey,
    offline_html: String,
    skip_waiting_on_install: bool,
    skip_waiting: AtomicBool,
    state: RwLock<WorkerState>,
    created_at: DateTime<Utc>,
}

impl std::fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("version", &self.version)
            .field("state", &self.state())
            .field("partitions", &self.partitions)
            .field("precache", &self.precache.len())
            .finish()
    }
}

impl ServiceWorker {
    pub fn new(
        config: WorkerConfig,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, DomainError> {
        let partitions = PartitionNames::versioned(&config.cache_prefix, &config.version)?;

        let classifier = Classifier::new(
            ClassifierConfig::new(config.app_origin.clone())
                .with_api_hosts(config.api_hosts.clone())
                .with_api_prefixes(config.api_prefixes.clone())
                .with_static_prefixes(config.static_prefixes.clone()),
        )?;

        let precache = config.resolve_all(&config.precache)?;
        let offline_url = config.resolve(&config.offline_page_path)?;
        let offline_key = CacheEntryKey::new(&offline_url);

        let dispatcher = StrategyDispatcher::new(
            storage.clone(),
            fetcher.clone(),
            partitions.clone(),
            offline_key.clone(),
        );

        let sync = SyncBridge::new(
            config.resolve_all(&config.sync_endpoints)?,
            fetcher.clone(),
            storage.clone(),
            partitions.api.clone(),
        );

        Ok(Self {
            offline_html: offline_page::render(&config.app_name, &config.version),
            version: config.version,
            partitions,
            classifier,
            dispatcher,
            sync,
            storage,
            fetcher,
            precache,
            offline_key,
            skip_waiting_on_install: config.skip_waiting_on_install,
            skip_waiting: AtomicBool::new(false),
            state: RwLock::new(WorkerState::Parsed),
            created_at: Utc::now(),
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn partitions(&self) -> &PartitionNames {
        &self.partitions
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn transition(&self, next: WorkerState) -> Result<(), DomainError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = state.transition(next)?;
        Ok(())
    }

    /// Marks the worker as superseded; a no-op if it already is
    pub fn retire(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *state != WorkerState::Redundant {
            *state = WorkerState::Redundant;
        }
    }

    /// Asks to be promoted without waiting for the previous version to go away
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Fetches the precache manifest and seeds the offline page.
    ///
    /// All or nothing: if any asset fails, the partitions this install
    /// created are deleted and the worker becomes redundant.
    pub async fn install(&self) -> Result<InstallReport, DomainError> {
        self.transition(WorkerState::Installing)?;
        info!(version = %self.version, assets = self.precache.len(), "Installing worker");

        let mut created = Vec::new();

        match self.populate(&mut created).await {
            Ok(precached) => {
                self.transition(WorkerState::Installed)?;
                counter!("sw_install_total", "outcome" => "success").increment(1);

                if self.skip_waiting_on_install {
                    self.skip_waiting();
                }

                info!(version = %self.version, precached, "Worker installed");
                Ok(InstallReport {
                    version: self.version.clone(),
                    precached,
                })
            }
            Err(e) => {
                error!(version = %self.version, error = %e, "Worker install failed");
                counter!("sw_install_total", "outcome" => "failure").increment(1);

                for name in &created {
                    if let Err(e) = self.storage.delete(name).await {
                        warn!(partition = %name, error = %e, "Failed to remove partition after install failure");
                    }
                }

                self.retire();
                Err(DomainError::install(&self.version, e.to_string()))
            }
        }
    }

    async fn populate(&self, created: &mut Vec<String>) -> Result<usize, DomainError> {
        for name in self.partitions.all() {
            if !self.storage.has(name).await? {
                created.push(name.to_string());
            }
            self.storage.open(name).await?;
        }

        let (assets, ()) = tokio::try_join!(self.fetch_precache(), self.seed_offline_page())?;
        let precached = assets.len();

        let partition = self.storage.open(&self.partitions.static_assets).await?;
        for (key, response) in assets {
            partition.put(key, response).await?;
        }

        Ok(precached)
    }

    async fn fetch_precache(&self) -> Result<Vec<(CacheEntryKey, Response)>, DomainError> {
        try_join_all(self.precache.iter().map(|url| self.fetch_asset(url))).await
    }

    async fn fetch_asset(&self, url: &Url) -> Result<(CacheEntryKey, Response), DomainError> {
        let response = self.fetcher.fetch(&FetchRequest::get(url.clone())).await?;

        if !response.is_success() {
            return Err(DomainError::network(
                url.as_str(),
                format!("Precache request returned {}", response.status()),
            ));
        }

        Ok((CacheEntryKey::new(url), response))
    }

    async fn seed_offline_page(&self) -> Result<(), DomainError> {
        let partition = self.storage.open(&self.partitions.dynamic).await?;
        partition
            .put(
                self.offline_key.clone(),
                Response::html(http::StatusCode::OK, self.offline_html.clone()),
            )
            .await
    }

    /// Evicts every partition not owned by this version
    pub async fn activate(&self) -> Result<ActivationReport, DomainError> {
        self.transition(WorkerState::Activating)?;

        let mut evicted = Vec::new();

        for name in self.storage.keys().await? {
            if self.partitions.contains(&name) {
                continue;
            }

            info!(partition = %name, "Deleting old cache partition");
            if self.storage.delete(&name).await? {
                evicted.push(name);
            }
        }

        self.transition(WorkerState::Activated)?;
        info!(version = %self.version, evicted = evicted.len(), "Worker activated");

        Ok(ActivationReport {
            version: self.version.clone(),
            evicted,
        })
    }

    pub async fn handle_fetch(&self, request: &FetchRequest) -> FetchOutcome {
        match self.classifier.classify(request) {
            Interception::Intercept(classification) => FetchOutcome::Responded {
                classification,
                response: self.dispatcher.dispatch(request, classification).await,
            },
            Interception::Passthrough(reason) => FetchOutcome::Passthrough(reason),
        }
    }

    pub async fn handle_message(&self, message: ControlMessage) -> Option<ControlReply> {
        match message {
            ControlMessage::SkipWaiting => {
                self.skip_waiting();
                None
            }
            ControlMessage::GetVersion => Some(ControlReply::Version {
                version: self.version.clone(),
                timestamp: Utc::now().timestamp_millis(),
            }),
            ControlMessage::ClearCache => match self.storage.clear().await {
                Ok(deleted) => {
                    info!(deleted, "Cleared all cache partitions");
                    Some(ControlReply::Cleared { success: true })
                }
                Err(e) => {
                    warn!(error = %e, "Failed to clear cache partitions");
                    Some(ControlReply::Cleared { success: false })
                }
            },
        }
    }

    /// Refreshes the sync endpoints after connectivity returns
    pub async fn on_online(&self, clients: &Clients) -> SyncReport {
        let report = self.sync.run(clients).await;

        let outcome = match (report.refreshed.is_empty(), report.failed.is_empty()) {
            (_, true) => "success",
            (false, false) => "partial",
            (true, false) => "failure",
        };
        counter!("sw_sync_total", "outcome" => outcome).increment(1);

        report
    }
}
