//! Network access seam

use async_trait::async_trait;

use super::{FetchRequest, Response};
use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Performs a real network fetch.
///
/// A resolved response with any status is `Ok`; only a failure to obtain a
/// response at all (connectivity, DNS, timeout) is `Err(DomainError::Network)`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<Response, DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Route {
        status: StatusCode,
        content_type: &'static str,
        body: Bytes,
    }

    /// Programmable network: per-URL responses and an online/offline switch
    #[derive(Debug)]
    pub struct MockNetwork {
        routes: Mutex<HashMap<String, Route>>,
        failing: Mutex<Vec<String>>,
        online: AtomicBool,
        calls: Mutex<Vec<String>>,
    }

    impl Default for MockNetwork {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockNetwork {
        pub fn new() -> Self {
            Self {
                routes: Mutex::new(HashMap::new()),
                failing: Mutex::new(Vec::new()),
                online: AtomicBool::new(true),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with_route(
            self,
            url: impl Into<String>,
            status: StatusCode,
            content_type: &'static str,
            body: impl Into<Bytes>,
        ) -> Self {
            self.set_route(url, status, content_type, body);
            self
        }

        pub fn with_text(self, url: impl Into<String>, body: &'static str) -> Self {
            self.with_route(url, StatusCode::OK, "text/plain", body)
        }

        /// Requests to this URL fail as if the host were unreachable
        pub fn with_unreachable(self, url: impl Into<String>) -> Self {
            self.failing.lock().unwrap().push(url.into());
            self
        }

        pub fn set_route(
            &self,
            url: impl Into<String>,
            status: StatusCode,
            content_type: &'static str,
            body: impl Into<Bytes>,
        ) {
            self.routes.lock().unwrap().insert(
                url.into(),
                Route {
                    status,
                    content_type,
                    body: body.into(),
                },
            );
        }

        pub fn go_offline(&self) {
            self.online.store(false, Ordering::SeqCst);
        }

        pub fn go_online(&self) {
            self.online.store(true, Ordering::SeqCst);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self, url: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|u| u.as_str() == url)
                .count()
        }
    }

    #[async_trait]
    impl Fetcher for MockNetwork {
        async fn fetch(&self, request: &FetchRequest) -> Result<Response, DomainError> {
            let url = request.url().as_str().to_string();
            self.calls.lock().unwrap().push(url.clone());

            if !self.online.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&url)
            {
                return Err(DomainError::network(url, "Failed to fetch"));
            }

            let route = self.routes.lock().unwrap().get(&url).cloned();

            match route {
                Some(route) => {
                    let mut headers = HeaderMap::new();
                    headers.insert(
                        HeaderName::from_static("content-type"),
                        HeaderValue::from_static(route.content_type),
                    );
                    Ok(Response::new(route.status, headers, route.body))
                }
                None => Ok(Response::new(
                    StatusCode::NOT_FOUND,
                    HeaderMap::new(),
                    "Not Found",
                )),
            }
        }
    }
}
