//! Connectivity monitoring

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

use crate::domain::fetch::{FetchRequest, Fetcher};
use crate::domain::Registration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityChange {
    WentOffline,
    CameOnline,
}

/// Turns probe results into offline/online transitions
#[derive(Debug, Default)]
pub struct ConnectivityTracker {
    online: Option<bool>,
}

impl ConnectivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_online(&self) -> Option<bool> {
        self.online
    }

    /// Records a probe result; the first observation only sets the baseline
    pub fn observe(&mut self, reachable: bool) -> Option<ConnectivityChange> {
        let previous = self.online.replace(reachable);

        match (previous, reachable) {
            (Some(true), false) => Some(ConnectivityChange::WentOffline),
            (Some(false), true) => Some(ConnectivityChange::CameOnline),
            _ => None,
        }
    }
}

/// Periodically probes the upstream and raises the online signal
pub struct ConnectivityMonitor {
    fetcher: Arc<dyn Fetcher>,
    registration: Arc<Registration>,
    probe: Url,
    interval: Duration,
}

impl ConnectivityMonitor {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        registration: Arc<Registration>,
        probe: Url,
        interval: Duration,
    ) -> Self {
        Self {
            fetcher,
            registration,
            probe,
            interval,
        }
    }

    /// Any response counts as reachable; only a failed fetch is offline
    pub async fn probe(&self) -> bool {
        self.fetcher
            .fetch(&FetchRequest::get(self.probe.clone()))
            .await
            .is_ok()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tracker = ConnectivityTracker::new();
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match tracker.observe(self.probe().await) {
                    Some(ConnectivityChange::WentOffline) => {
                        warn!(probe = %self.probe, "Upstream unreachable, serving from cache");
                    }
                    Some(ConnectivityChange::CameOnline) => {
                        info!(probe = %self.probe, "Upstream reachable again, syncing");
                        self.registration.notify_online().await;
                    }
                    None => {}
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fetch::MockNetwork;
    use crate::domain::Clients;

    #[test]
    fn test_tracker_transitions() {
        let mut tracker = ConnectivityTracker::new();

        assert_eq!(tracker.observe(true), None);
        assert_eq!(tracker.observe(true), None);
        assert_eq!(tracker.observe(false), Some(ConnectivityChange::WentOffline));
        assert_eq!(tracker.observe(false), None);
        assert_eq!(tracker.observe(true), Some(ConnectivityChange::CameOnline));
        assert_eq!(tracker.is_online(), Some(true));
    }

    #[test]
    fn test_tracker_starting_offline() {
        let mut tracker = ConnectivityTracker::new();

        assert_eq!(tracker.observe(false), None);
        assert_eq!(tracker.observe(true), Some(ConnectivityChange::CameOnline));
    }

    #[tokio::test]
    async fn test_probe_follows_network() {
        let network = Arc::new(MockNetwork::new());
        let monitor = ConnectivityMonitor::new(
            network.clone(),
            Arc::new(Registration::new(Clients::default())),
            Url::parse("http://app.local/").unwrap(),
            Duration::from_secs(5),
        );

        // 404 still proves the upstream is reachable
        assert!(monitor.probe().await);

        network.go_offline();
        assert!(!monitor.probe().await);
    }
}
