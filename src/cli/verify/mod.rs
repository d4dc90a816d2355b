//! Verify command - fetches the precache manifest once against the upstream

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};
use url::Url;

use crate::config::AppConfig;
use crate::domain::{FetchRequest, Fetcher};
use crate::infrastructure::logging::init_logging;

/// Outcome of fetching one manifest entry
#[derive(Debug, Clone, PartialEq)]
pub enum AssetCheck {
    Ok { url: Url, bytes: usize },
    Failed { url: Url, reason: String },
}

impl AssetCheck {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    init_logging(&config.logging);

    let fetcher = crate::create_fetcher(&config)?;
    let worker = config.worker_config()?;
    let manifest = worker.resolve_all(&worker.precache)?;

    info!(version = %worker.version, assets = manifest.len(), "Verifying precache manifest");

    let checks = check_manifest(fetcher, manifest).await;
    let failed: Vec<&AssetCheck> = checks.iter().filter(|c| !c.is_ok()).collect();

    for check in &checks {
        match check {
            AssetCheck::Ok { url, bytes } => println!("ok      {} ({} bytes)", url, bytes),
            AssetCheck::Failed { url, reason } => println!("FAILED  {} - {}", url, reason),
        }
    }

    if !failed.is_empty() {
        anyhow::bail!(
            "{} of {} precache assets failed; installing version {} would fail",
            failed.len(),
            checks.len(),
            worker.version
        );
    }

    println!("All {} precache assets are reachable", checks.len());
    Ok(())
}

/// Fetches every manifest entry concurrently. Only a 2xx response passes.
pub async fn check_manifest(fetcher: Arc<dyn Fetcher>, manifest: Vec<Url>) -> Vec<AssetCheck> {
    let checks = manifest.into_iter().map(|url| {
        let fetcher = fetcher.clone();
        async move {
            match fetcher.fetch(&FetchRequest::get(url.clone())).await {
                Ok(response) if response.is_success() => AssetCheck::Ok {
                    url,
                    bytes: response.into_body().len(),
                },
                Ok(response) => {
                    warn!(url = %url, status = %response.status(), "Precache asset rejected");
                    AssetCheck::Failed {
                        url,
                        reason: format!("HTTP {}", response.status()),
                    }
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Precache asset unreachable");
                    AssetCheck::Failed {
                        url,
                        reason: e.to_string(),
                    }
                }
            }
        }
    });

    join_all(checks).await
}
