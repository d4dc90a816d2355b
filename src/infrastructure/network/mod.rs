//! Network infrastructure - upstream fetcher and connectivity monitor

mod connectivity;
mod http_fetcher;

pub use connectivity::{ConnectivityChange, ConnectivityMonitor, ConnectivityTracker};
pub use http_fetcher::{HttpFetcher, UpstreamRewrite};
