//! Network fetcher using reqwest

use std::time::Duration;

use async_trait::async_trait;
use http::header::{self, HeaderMap, HeaderName};
use tracing::debug;
use url::{Origin, Position, Url};

use crate::domain::fetch::{FetchRequest, Fetcher, Response};
use crate::domain::DomainError;

/// Headers that describe a single connection and must not be forwarded
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove(header::CONTENT_LENGTH);
}

/// Maps the public application origin onto the upstream server
#[derive(Debug, Clone)]
pub struct UpstreamRewrite {
    public_origin: Origin,
    upstream: Url,
}

impl UpstreamRewrite {
    pub fn new(public_origin: &Url, upstream: Url) -> Result<Self, DomainError> {
        if upstream.cannot_be_a_base() || !matches!(upstream.scheme(), "http" | "https") {
            return Err(DomainError::configuration(format!(
                "Upstream '{}' must be an http(s) URL",
                upstream
            )));
        }

        Ok(Self {
            public_origin: public_origin.origin(),
            upstream,
        })
    }

    /// Same-origin URLs go to the upstream; anything else is left alone
    pub fn target(&self, url: &Url) -> Result<Url, DomainError> {
        if url.origin() != self.public_origin {
            return Ok(url.clone());
        }

        let base = self.upstream.as_str().trim_end_matches('/');
        let target = format!("{}{}", base, &url[Position::BeforePath..]);

        Url::parse(&target)
            .map_err(|e| DomainError::internal(format!("Invalid upstream URL '{}': {}", target, e)))
    }
}

/// Real network access for the gateway.
///
/// Redirects are returned to the caller instead of being followed.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    rewrite: Option<UpstreamRewrite>,
}

impl HttpFetcher {
    pub fn new(timeout: Option<Duration>) -> Result<Self, DomainError> {
        let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rewrite: None,
        })
    }

    pub fn with_upstream(mut self, rewrite: UpstreamRewrite) -> Self {
        self.rewrite = Some(rewrite);
        self
    }

    fn target(&self, url: &Url) -> Result<Url, DomainError> {
        match &self.rewrite {
            Some(rewrite) => rewrite.target(url),
            None => Ok(url.clone()),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Response, DomainError> {
        let target = self.target(request.url())?;

        let mut headers = request.headers().clone();
        strip_hop_by_hop(&mut headers);

        debug!(method = %request.method(), url = %request.url(), target = %target, "Fetching");

        let response = self
            .client
            .request(request.method().clone(), target)
            .headers(headers)
            .body(request.body().clone())
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    "Request timed out".to_string()
                } else if e.is_connect() {
                    "Connection failed".to_string()
                } else {
                    format!("Request failed: {}", e)
                };
                DomainError::network(request.url().as_str(), message)
            })?;

        let status = response.status();
        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);

        let body = response.bytes().await.map_err(|e| {
            DomainError::network(
                request.url().as_str(),
                format!("Failed to read body: {}", e),
            )
        })?;

        Ok(Response::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};
    use wiremock::matchers::{body_string, header as header_matcher, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PUBLIC: &str = "http://localhost:8080";

    fn fetcher(upstream: &str) -> HttpFetcher {
        let rewrite = UpstreamRewrite::new(
            &Url::parse(PUBLIC).unwrap(),
            Url::parse(upstream).unwrap(),
        )
        .unwrap();

        HttpFetcher::new(Some(Duration::from_secs(5)))
            .unwrap()
            .with_upstream(rewrite)
    }

    #[test]
    fn test_rewrite_same_origin_only() {
        let rewrite = UpstreamRewrite::new(
            &Url::parse(PUBLIC).unwrap(),
            Url::parse("http://127.0.0.1:3000/").unwrap(),
        )
        .unwrap();

        let url = Url::parse("http://localhost:8080/api/stocks?symbol=SBER").unwrap();
        assert_eq!(
            rewrite.target(&url).unwrap().as_str(),
            "http://127.0.0.1:3000/api/stocks?symbol=SBER"
        );

        let foreign = Url::parse("https://www.cbr-xml-daily.ru/daily_json.js").unwrap();
        assert_eq!(rewrite.target(&foreign).unwrap(), foreign);
    }

    #[test]
    fn test_rewrite_rejects_invalid_upstream() {
        let public = Url::parse(PUBLIC).unwrap();
        assert!(UpstreamRewrite::new(&public, Url::parse("ftp://files.local").unwrap()).is_err());
    }

    #[tokio::test]
    async fn test_fetch_through_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/static/css/main.css"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/css")
                    .set_body_raw("body{}", "text/css"),
            )
            .mount(&server)
            .await;

        let request = FetchRequest::get_str("http://localhost:8080/static/css/main.css").unwrap();
        let response = fetcher(&server.uri()).fetch(&request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/css");
        assert_eq!(response.into_text().unwrap(), "body{}");
    }

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/stocks"))
            .and(query_param("symbol", "SBER"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let request =
            FetchRequest::get_str("http://localhost:8080/api/stocks?symbol=SBER").unwrap();
        let response = fetcher(&server.uri()).fetch(&request).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_forwards_method_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/goals"))
            .and(header_matcher("x-client", "pfm"))
            .and(body_string(r#"{"name":"car"}"#))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let request = FetchRequest::get_str("http://localhost:8080/api/goals")
            .unwrap()
            .with_method(Method::POST)
            .with_header(
                HeaderName::from_static("x-client"),
                http::HeaderValue::from_static("pfm"),
            )
            .with_body(r#"{"name":"car"}"#);

        let response = fetcher(&server.uri()).fetch(&request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_redirects_are_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/new"))
            .mount(&server)
            .await;

        let request = FetchRequest::get_str("http://localhost:8080/old").unwrap();
        let response = fetcher(&server.uri()).fetch(&request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()["location"], "/new");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_network_error() {
        let request = FetchRequest::get_str("http://localhost:8080/").unwrap();
        let err = fetcher("http://127.0.0.1:1").fetch(&request).await.unwrap_err();

        assert!(err.is_network());
    }
}
