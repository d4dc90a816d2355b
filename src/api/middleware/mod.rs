//! HTTP middleware

pub mod logging;
pub mod metrics;

pub use logging::logging_middleware;
pub use metrics::metrics_middleware;
