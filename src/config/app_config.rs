use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::domain::lifecycle::DEFAULT_OFFLINE_PAGE_PATH;
use crate::domain::{DomainError, WorkerConfig};
use crate::infrastructure::cache::{CacheConfig, CacheType};
use crate::infrastructure::observability::ObservabilityConfig;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub worker: WorkerSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where the application is really served from, and the origin clients see
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub url: String,
    pub public_origin: String,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub version: String,
    pub cache_prefix: String,
    pub app_name: String,
    pub precache: Vec<String>,
    pub api_hosts: Vec<String>,
    pub api_prefixes: Vec<String>,
    pub static_prefixes: Vec<String>,
    pub offline_page_path: String,
    pub sync_endpoints: Vec<String>,
    pub skip_waiting_on_install: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: String,
    pub redis_url: Option<String>,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    pub enabled: bool,
    pub probe_path: String,
    pub interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".to_string(),
            public_origin: "http://localhost:8080".to_string(),
            request_timeout_secs: Some(30),
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            cache_prefix: "finance".to_string(),
            app_name: "Personal Finance".to_string(),
            precache: [
                "/",
                "/index.html",
                "/static/js/bundle.js",
                "/static/css/main.css",
                "/manifest.json",
                "/favicon.ico",
            ]
            .map(String::from)
            .to_vec(),
            api_hosts: ["cbr-xml-daily.ru", "alphavantage.co"]
                .map(String::from)
                .to_vec(),
            api_prefixes: vec!["/api/".to_string()],
            static_prefixes: vec!["/static/".to_string()],
            offline_page_path: DEFAULT_OFFLINE_PAGE_PATH.to_string(),
            sync_endpoints: ["/api/cbr/currencies", "/api/stocks"]
                .map(String::from)
                .to_vec(),
            skip_waiting_on_install: true,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: "in_memory".to_string(),
            redis_url: None,
            key_prefix: "pfm-sw".to_string(),
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            probe_path: "/".to_string(),
            interval_secs: 15,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("worker.precache")
                    .with_list_parse_key("worker.api_hosts")
                    .with_list_parse_key("worker.api_prefixes")
                    .with_list_parse_key("worker.static_prefixes")
                    .with_list_parse_key("worker.sync_endpoints")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn public_origin(&self) -> Result<Url, DomainError> {
        parse_url("public origin", &self.upstream.public_origin)
    }

    pub fn upstream_url(&self) -> Result<Url, DomainError> {
        parse_url("upstream", &self.upstream.url)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.upstream.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn worker_config(&self) -> Result<WorkerConfig, DomainError> {
        let settings = &self.worker;

        Ok(WorkerConfig {
            version: settings.version.clone(),
            cache_prefix: settings.cache_prefix.clone(),
            app_name: settings.app_name.clone(),
            app_origin: self.public_origin()?,
            precache: settings.precache.clone(),
            api_hosts: settings.api_hosts.clone(),
            api_prefixes: settings.api_prefixes.clone(),
            static_prefixes: settings.static_prefixes.clone(),
            offline_page_path: settings.offline_page_path.clone(),
            sync_endpoints: settings.sync_endpoints.clone(),
            skip_waiting_on_install: settings.skip_waiting_on_install,
        })
    }

    pub fn cache_config(&self) -> Result<CacheConfig, DomainError> {
        Ok(CacheConfig {
            cache_type: self.cache.backend.parse::<CacheType>()?,
            redis_url: self.cache.redis_url.clone(),
            key_prefix: Some(self.cache.key_prefix.clone()),
        })
    }

    pub fn probe_url(&self) -> Result<Url, DomainError> {
        self.public_origin()?
            .join(&self.connectivity.probe_path)
            .map_err(|e| DomainError::configuration(format!("Invalid probe path: {}", e)))
    }
}

fn parse_url(label: &str, value: &str) -> Result<Url, DomainError> {
    Url::parse(value)
        .map_err(|e| DomainError::configuration(format!("Invalid {} URL '{}': {}", label, value, e)))
}
