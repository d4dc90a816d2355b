//! Worker lifecycle - install, activate, control messages and registration

mod message;
mod registration;
mod state;
mod worker;

pub use message::{ControlMessage, ControlReply, MessageEnvelope};
pub use registration::{Registration, RegistrationStatus, WorkerStatus};
pub use state::WorkerState;
pub use worker::{ActivationReport, FetchOutcome, InstallReport, ServiceWorker};

use url::Url;

use crate::domain::DomainError;

pub const DEFAULT_OFFLINE_PAGE_PATH: &str = "/offline.html";

/// Everything needed to build one worker version
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub version: String,
    pub cache_prefix: String,
    pub app_name: String,
    /// Public origin the application is served from
    pub app_origin: Url,
    /// Paths (or absolute URLs) fetched during install
    pub precache: Vec<String>,
    pub api_hosts: Vec<String>,
    pub api_prefixes: Vec<String>,
    pub static_prefixes: Vec<String>,
    pub offline_page_path: String,
    /// Paths (or absolute URLs) refreshed after reconnecting
    pub sync_endpoints: Vec<String>,
    /// Promote immediately after a successful install
    pub skip_waiting_on_install: bool,
}

impl WorkerConfig {
    pub fn new(version: impl Into<String>, app_origin: Url) -> Self {
        Self {
            version: version.into(),
            cache_prefix: "finance".to_string(),
            app_name: "Personal Finance".to_string(),
            app_origin,
            precache: Vec::new(),
            api_hosts: Vec::new(),
            api_prefixes: vec!["/api/".to_string()],
            static_prefixes: vec!["/static/".to_string()],
            offline_page_path: DEFAULT_OFFLINE_PAGE_PATH.to_string(),
            sync_endpoints: Vec::new(),
            skip_waiting_on_install: true,
        }
    }

    pub fn with_precache(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.precache = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sync_endpoints(
        mut self,
        paths: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.sync_endpoints = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_api_hosts(mut self, hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.api_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    pub fn with_skip_waiting_on_install(mut self, skip: bool) -> Self {
        self.skip_waiting_on_install = skip;
        self
    }

    /// Resolves a configured path against the application origin
    pub fn resolve(&self, path: &str) -> Result<Url, DomainError> {
        self.app_origin.join(path).map_err(|e| {
            DomainError::configuration(format!("Invalid URL '{}': {}", path, e))
        })
    }

    pub fn resolve_all(&self, paths: &[String]) -> Result<Vec<Url>, DomainError> {
        paths.iter().map(|p| self.resolve(p)).collect()
    }
}
