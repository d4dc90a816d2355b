//! Caching strategies, one per request classification

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use super::cache::{CacheStorage, PartitionKind, PartitionNames};
use super::classifier::RequestClassification;
use super::fetch::{CacheEntryKey, FetchRequest, Fetcher, Response};
use super::DomainError;

pub const STATIC_UNAVAILABLE_MESSAGE: &str = "Offline - this resource is not available in the cache";
pub const API_UNAVAILABLE_MESSAGE: &str = "Network unavailable and no cached data for this request";
pub const DYNAMIC_UNAVAILABLE_MESSAGE: &str = "Service unavailable while offline";

/// Strategy applied to a classified request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve from cache, fetch and store on miss
    CacheFirst,
    /// Fetch, store on success, fall back to the api partition
    NetworkFirst,
    /// Fetch, fall back to the cached page, then to the offline page
    NetworkFirstWithOfflinePage,
    /// Fetch and store opportunistically, fall back to any cached copy
    Opportunistic,
}

impl From<RequestClassification> for Strategy {
    fn from(classification: RequestClassification) -> Self {
        match classification {
            RequestClassification::StaticAsset => Self::CacheFirst,
            RequestClassification::ApiCall => Self::NetworkFirst,
            RequestClassification::Navigation => Self::NetworkFirstWithOfflinePage,
            RequestClassification::Other => Self::Opportunistic,
        }
    }
}

/// Maps classified requests to their strategy and runs it.
///
/// Dispatch never fails: network errors fall back to cached copies or to a
/// synthetic response, and cache write errors are logged and swallowed.
pub struct StrategyDispatcher {
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    partitions: PartitionNames,
    offline_key: CacheEntryKey,
}

impl std::fmt::Debug for StrategyDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyDispatcher")
            .field("storage", &self.storage)
            .field("partitions", &self.partitions)
            .field("offline_key", &self.offline_key)
            .finish()
    }
}

impl StrategyDispatcher {
    pub fn new(
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        partitions: PartitionNames,
        offline_key: CacheEntryKey,
    ) -> Self {
        Self {
            storage,
            fetcher,
            partitions,
            offline_key,
        }
    }

    pub async fn dispatch(
        &self,
        request: &FetchRequest,
        classification: RequestClassification,
    ) -> Response {
        match Strategy::from(classification) {
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst => self.network_first(request).await,
            Strategy::NetworkFirstWithOfflinePage => self.network_first_with_offline_page(request).await,
            Strategy::Opportunistic => self.opportunistic(request).await,
        }
    }

    async fn cache_first(&self, request: &FetchRequest) -> Response {
        let key = request.cache_key();

        if let Some(key) = &key {
            match self.storage.match_request(key).await {
                Ok(Some(cached)) => {
                    debug!(url = %key, "Serving static asset from cache");
                    return cached;
                }
                Ok(None) => {}
                Err(e) => warn!(url = %key, error = %e, "Cache lookup failed"),
            }
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if let (Some(key), true) = (key, response.is_success()) {
                    self.write_through(PartitionKind::Static, key, response.duplicate())
                        .await;
                }
                response
            }
            Err(e) => {
                debug!(url = %request.url(), error = %e, "Static asset unavailable");
                Response::unavailable(STATIC_UNAVAILABLE_MESSAGE)
            }
        }
    }

    async fn network_first(&self, request: &FetchRequest) -> Response {
        let key = request.cache_key();

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if let (Some(key), true) = (key, response.is_success()) {
                    self.write_through(PartitionKind::Api, key, response.duplicate())
                        .await;
                }
                response
            }
            Err(e) => {
                debug!(url = %request.url(), error = %e, "API fetch failed, trying cache");

                if let Some(key) = &key {
                    if let Some(cached) = self.lookup_in(PartitionKind::Api, key).await {
                        return cached.with_stale_marker();
                    }
                }

                Response::offline_api_error(API_UNAVAILABLE_MESSAGE)
            }
        }
    }

    async fn network_first_with_offline_page(&self, request: &FetchRequest) -> Response {
        let key = request.cache_key();

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if let (Some(key), true) = (key, response.is_success()) {
                    self.write_through(PartitionKind::Dynamic, key, response.duplicate())
                        .await;
                }
                response
            }
            Err(e) => {
                debug!(url = %request.url(), error = %e, "Navigation failed, trying cache");

                if let Some(key) = &key {
                    if let Some(cached) = self.lookup_in(PartitionKind::Dynamic, key).await {
                        return cached;
                    }
                }

                match self.lookup_in(PartitionKind::Dynamic, &self.offline_key).await {
                    Some(offline_page) => offline_page,
                    None => Response::unavailable(DYNAMIC_UNAVAILABLE_MESSAGE),
                }
            }
        }
    }

    async fn opportunistic(&self, request: &FetchRequest) -> Response {
        let key = request.cache_key();

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if let (Some(key), true) = (&key, response.is_success()) {
                    self.write_through(PartitionKind::Dynamic, key.clone(), response.duplicate())
                        .await;
                }
                response
            }
            Err(e) => {
                debug!(url = %request.url(), error = %e, "Fetch failed, trying cache");

                if let Some(key) = &key {
                    match self.storage.match_request(key).await {
                        Ok(Some(cached)) => return cached,
                        Ok(None) => {}
                        Err(e) => warn!(url = %key, error = %e, "Cache lookup failed"),
                    }
                }

                Response::unavailable(DYNAMIC_UNAVAILABLE_MESSAGE)
            }
        }
    }

    async fn lookup_in(&self, kind: PartitionKind, key: &CacheEntryKey) -> Option<Response> {
        let name = self.partitions.get(kind);

        let result = match self.storage.open(name).await {
            Ok(partition) => partition.lookup(key).await,
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            warn!(partition = name, url = %key, error = %e, "Cache lookup failed");
            None
        })
    }

    async fn write_through(&self, kind: PartitionKind, key: CacheEntryKey, response: Response) {
        let name = self.partitions.get(kind);

        if let Err(e) = self.store(name, key.clone(), response).await {
            warn!(partition = name, url = %key, error = %e, "Cache write failed");
            counter!("sw_cache_write_failures_total", "partition" => kind.as_str()).increment(1);
        }
    }

    async fn store(
        &self,
        name: &str,
        key: CacheEntryKey,
        response: Response,
    ) -> Result<(), DomainError> {
        let partition = self.storage.open(name).await?;
        partition.put(key, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::MockCacheStorage;
    use crate::domain::fetch::{MockFetcher, MockNetwork, OfflineApiError, ResponseSource};
    use http::{HeaderMap, Method, StatusCode};
    use url::Url;

    const ORIGIN: &str = "http://app.local";

    fn url(path: &str) -> String {
        format!("{}{}", ORIGIN, path)
    }

    fn names() -> PartitionNames {
        PartitionNames::versioned("finance", "v1").unwrap()
    }

    fn offline_key() -> CacheEntryKey {
        CacheEntryKey::new(&Url::parse(&url("/offline.html")).unwrap())
    }

    fn dispatcher(
        storage: Arc<MockCacheStorage>,
        network: Arc<MockNetwork>,
    ) -> StrategyDispatcher {
        StrategyDispatcher::new(storage, network, names(), offline_key())
    }

    fn get(path: &str) -> FetchRequest {
        FetchRequest::get_str(&url(path)).unwrap()
    }

    async fn cached_text(storage: &MockCacheStorage, partition: &str, path: &str) -> Option<String> {
        let partition = storage.open(partition).await.unwrap();
        let key = get(path).cache_key().unwrap();
        partition
            .lookup(&key)
            .await
            .unwrap()
            .map(|r| r.into_text().unwrap())
    }

    #[test]
    fn test_strategy_for_classification() {
        assert_eq!(
            Strategy::from(RequestClassification::StaticAsset),
            Strategy::CacheFirst
        );
        assert_eq!(
            Strategy::from(RequestClassification::ApiCall),
            Strategy::NetworkFirst
        );
        assert_eq!(
            Strategy::from(RequestClassification::Navigation),
            Strategy::NetworkFirstWithOfflinePage
        );
        assert_eq!(
            Strategy::from(RequestClassification::Other),
            Strategy::Opportunistic
        );
    }

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let storage = Arc::new(MockCacheStorage::new());
        let partition = storage.open(&names().static_assets).await.unwrap();
        let key = get("/static/js/bundle.js").cache_key().unwrap();
        partition
            .put(key, Response::new(StatusCode::OK, HeaderMap::new(), "cached js"))
            .await
            .unwrap();

        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().never();

        let dispatcher =
            StrategyDispatcher::new(storage, Arc::new(fetcher), names(), offline_key());
        let response = dispatcher
            .dispatch(&get("/static/js/bundle.js"), RequestClassification::StaticAsset)
            .await;

        assert_eq!(response.source(), ResponseSource::Cache);
        assert_eq!(response.into_text().unwrap(), "cached js");
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_and_stores() {
        let storage = Arc::new(MockCacheStorage::new());
        let network = Arc::new(MockNetwork::new().with_text(url("/static/css/main.css"), "css"));
        let dispatcher = dispatcher(storage.clone(), network.clone());

        let response = dispatcher
            .dispatch(&get("/static/css/main.css"), RequestClassification::StaticAsset)
            .await;

        assert_eq!(response.source(), ResponseSource::Network);
        assert_eq!(response.into_text().unwrap(), "css");
        assert_eq!(
            cached_text(&storage, &names().static_assets, "/static/css/main.css").await,
            Some("css".to_string())
        );

        // Second request is served without touching the network
        let again = dispatcher
            .dispatch(&get("/static/css/main.css"), RequestClassification::StaticAsset)
            .await;
        assert_eq!(again.source(), ResponseSource::Cache);
        assert_eq!(network.call_count(&url("/static/css/main.css")), 1);
    }

    #[tokio::test]
    async fn test_cache_first_does_not_store_errors() {
        let storage = Arc::new(MockCacheStorage::new());
        let network = Arc::new(MockNetwork::new());
        let dispatcher = dispatcher(storage.clone(), network);

        let response = dispatcher
            .dispatch(&get("/static/missing.js"), RequestClassification::StaticAsset)
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            cached_text(&storage, &names().static_assets, "/static/missing.js").await,
            None
        );
    }

    #[tokio::test]
    async fn test_cache_first_offline_miss_is_503_text() {
        let network = Arc::new(MockNetwork::new());
        network.go_offline();
        let dispatcher = dispatcher(Arc::new(MockCacheStorage::new()), network);

        let response = dispatcher
            .dispatch(&get("/static/js/bundle.js"), RequestClassification::StaticAsset)
            .await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()["content-type"], "text/plain; charset=utf-8");
        assert_eq!(response.into_text().unwrap(), STATIC_UNAVAILABLE_MESSAGE);
    }

    #[tokio::test]
    async fn test_network_first_stores_and_falls_back_with_marker() {
        let storage = Arc::new(MockCacheStorage::new());
        let network = Arc::new(MockNetwork::new().with_route(
            url("/api/cbr/currencies"),
            StatusCode::OK,
            "application/json",
            r#"{"USD":92.5}"#,
        ));
        let dispatcher = dispatcher(storage.clone(), network.clone());

        let live = dispatcher
            .dispatch(&get("/api/cbr/currencies"), RequestClassification::ApiCall)
            .await;
        assert_eq!(live.source(), ResponseSource::Network);
        assert!(!live.is_stale());
        let live_body = live.into_text().unwrap();

        network.go_offline();

        let fallback = dispatcher
            .dispatch(&get("/api/cbr/currencies"), RequestClassification::ApiCall)
            .await;
        assert_eq!(fallback.status(), StatusCode::OK);
        assert!(fallback.is_stale());
        assert_eq!(fallback.into_text().unwrap(), live_body);
    }

    #[tokio::test]
    async fn test_network_first_prefers_network_over_cache() {
        let storage = Arc::new(MockCacheStorage::new());
        let network = Arc::new(MockNetwork::new().with_text(url("/api/stocks"), "first"));
        let dispatcher = dispatcher(storage.clone(), network.clone());

        dispatcher
            .dispatch(&get("/api/stocks"), RequestClassification::ApiCall)
            .await;
        network.set_route(url("/api/stocks"), StatusCode::OK, "text/plain", "second");

        let response = dispatcher
            .dispatch(&get("/api/stocks"), RequestClassification::ApiCall)
            .await;
        assert_eq!(response.into_text().unwrap(), "second");
        assert_eq!(
            cached_text(&storage, &names().api, "/api/stocks").await,
            Some("second".to_string())
        );
    }

    #[tokio::test]
    async fn test_network_first_offline_miss_is_json_503() {
        let network = Arc::new(MockNetwork::new());
        network.go_offline();
        let dispatcher = dispatcher(Arc::new(MockCacheStorage::new()), network);

        let response = dispatcher
            .dispatch(&get("/api/stocks"), RequestClassification::ApiCall)
            .await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let payload: OfflineApiError = response.into_json().unwrap();
        assert_eq!(payload.error, API_UNAVAILABLE_MESSAGE);
        assert!(!payload.cached);
    }

    #[tokio::test]
    async fn test_network_first_never_stores_writes() {
        let storage = Arc::new(MockCacheStorage::new());
        let network = Arc::new(MockNetwork::new().with_text(url("/api/goals"), "created"));
        let dispatcher = dispatcher(storage.clone(), network.clone());

        let post = get("/api/goals").with_method(Method::POST);
        let response = dispatcher.dispatch(&post, RequestClassification::ApiCall).await;
        assert_eq!(response.into_text().unwrap(), "created");
        assert_eq!(cached_text(&storage, &names().api, "/api/goals").await, None);

        network.go_offline();
        let response = dispatcher.dispatch(&post, RequestClassification::ApiCall).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_cache_write_failure_still_returns_network_response() {
        let storage = Arc::new(MockCacheStorage::new().with_put_error());
        let network = Arc::new(MockNetwork::new().with_text(url("/api/stocks"), "live"));
        let dispatcher = dispatcher(storage, network);

        let response = dispatcher
            .dispatch(&get("/api/stocks"), RequestClassification::ApiCall)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.into_text().unwrap(), "live");
    }

    #[tokio::test]
    async fn test_navigation_serves_cached_page_then_offline_page() {
        let storage = Arc::new(MockCacheStorage::new());
        let dynamic = storage.open(&names().dynamic).await.unwrap();
        dynamic
            .put(
                offline_key(),
                Response::html(StatusCode::OK, "<h1>You are offline</h1>"),
            )
            .await
            .unwrap();

        let network = Arc::new(MockNetwork::new().with_route(
            url("/budget"),
            StatusCode::OK,
            "text/html",
            "<h1>Budget</h1>",
        ));
        let dispatcher = dispatcher(storage.clone(), network.clone());

        let page = dispatcher
            .dispatch(&get("/budget").navigate(), RequestClassification::Navigation)
            .await;
        assert_eq!(page.into_text().unwrap(), "<h1>Budget</h1>");

        network.go_offline();

        let cached = dispatcher
            .dispatch(&get("/budget").navigate(), RequestClassification::Navigation)
            .await;
        assert_eq!(cached.into_text().unwrap(), "<h1>Budget</h1>");

        let never_visited = dispatcher
            .dispatch(&get("/goals").navigate(), RequestClassification::Navigation)
            .await;
        assert_eq!(never_visited.into_text().unwrap(), "<h1>You are offline</h1>");
    }

    #[tokio::test]
    async fn test_navigation_without_offline_page_is_503() {
        let network = Arc::new(MockNetwork::new());
        network.go_offline();
        let dispatcher = dispatcher(Arc::new(MockCacheStorage::new()), network);

        let response = dispatcher
            .dispatch(&get("/").navigate(), RequestClassification::Navigation)
            .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_opportunistic_caches_and_falls_back() {
        let storage = Arc::new(MockCacheStorage::new());
        let network = Arc::new(MockNetwork::new().with_text(url("/random-xhr"), "payload"));
        let dispatcher = dispatcher(storage.clone(), network.clone());

        let live = dispatcher
            .dispatch(&get("/random-xhr"), RequestClassification::Other)
            .await;
        assert_eq!(live.into_text().unwrap(), "payload");
        assert_eq!(
            cached_text(&storage, &names().dynamic, "/random-xhr").await,
            Some("payload".to_string())
        );

        network.go_offline();

        let fallback = dispatcher
            .dispatch(&get("/random-xhr"), RequestClassification::Other)
            .await;
        assert_eq!(fallback.source(), ResponseSource::Cache);
        assert_eq!(fallback.into_text().unwrap(), "payload");

        let miss = dispatcher
            .dispatch(&get("/other-xhr"), RequestClassification::Other)
            .await;
        assert_eq!(miss.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(miss.into_text().unwrap(), DYNAMIC_UNAVAILABLE_MESSAGE);
    }

    #[tokio::test]
    async fn test_returned_and_cached_bodies_are_independent() {
        let storage = Arc::new(MockCacheStorage::new());
        let network = Arc::new(MockNetwork::new().with_text(url("/api/stocks"), "quote"));
        let dispatcher = dispatcher(storage.clone(), network);

        let returned = dispatcher
            .dispatch(&get("/api/stocks"), RequestClassification::ApiCall)
            .await;
        let returned_body = returned.into_body();

        let cached = cached_text(&storage, &names().api, "/api/stocks").await;
        assert_eq!(&returned_body[..], b"quote");
        assert_eq!(cached, Some("quote".to_string()));
    }
}
