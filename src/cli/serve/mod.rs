//! Serve command - runs the gateway

use std::net::SocketAddr;
use std::time::Duration;

use clap::Args;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use crate::api::create_router;
use crate::config::AppConfig;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::network::ConnectivityMonitor;
use crate::infrastructure::observability::init_metrics;

#[derive(Args, Clone, Debug, Default)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Upstream application URL (overrides config)
    #[arg(long)]
    pub upstream: Option<String>,
}

impl ServeArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(upstream) = &self.upstream {
            config.upstream.url = upstream.clone();
        }
    }
}

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load().unwrap_or_default();
    args.apply(&mut config);
    init_logging(&config.logging);

    let state = crate::create_app_state_with_config(&config).await?;

    // The gateway still proxies when the first install fails; a later
    // POST /__sw/update retries it.
    match state.deploy().await {
        Ok(worker) => info!(version = %worker.version(), "Initial worker version active"),
        Err(e) => error!(error = %e, "Initial worker install failed, passing requests through"),
    }

    let monitor = if config.connectivity.enabled {
        let monitor = ConnectivityMonitor::new(
            state.network.clone(),
            state.registration.clone(),
            config.probe_url()?,
            Duration::from_secs(config.connectivity.interval_secs.max(1)),
        );
        Some(monitor.spawn())
    } else {
        None
    };

    let metrics = init_metrics(&config.observability.metrics);
    let app = create_router(state, metrics, &config.observability.metrics.path);

    let addr = build_socket_addr(&config)?;
    info!(
        upstream = %config.upstream.url,
        "Starting offline gateway on {}", addr
    );

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(monitor) = monitor {
        monitor.abort();
    }
    info!("Gateway shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

fn build_socket_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    )))
}
