use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use super::control;
use super::health;
use super::middleware::{logging_middleware, metrics_middleware};
use super::proxy;
use super::state::AppState;
use crate::infrastructure::observability::{create_metrics_router, PrometheusMetrics};

/// Gateway router: probes, the `/__sw` control surface, and the proxy fallback
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .nest("/__sw", control::create_control_router())
        .fallback(proxy::gateway_handler)
        .with_state(state)
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Full router, with the Prometheus endpoint when metrics are enabled
pub fn create_router(
    state: AppState,
    metrics: Option<PrometheusMetrics>,
    metrics_path: &str,
) -> Router {
    let mut router = create_router_with_state(state);

    if let Some(m) = metrics {
        router = router.merge(create_metrics_router(m, metrics_path));
    }

    router
}
