//! Layered application configuration

mod app_config;

pub use app_config::{
    AppConfig, CacheSettings, ConnectivityConfig, LogFormat, LoggingConfig, ServerConfig,
    UpstreamConfig, WorkerSettings,
};
