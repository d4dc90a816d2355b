//! Response model with a single-read body

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Header added to API responses served from the cache while offline
pub const STALE_MARKER_HEADER: &str = "x-served-from-cache";

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    Synthetic,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Cache => "cache",
            Self::Synthetic => "synthetic",
        }
    }
}

/// JSON body returned for an API call that failed with nothing cached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineApiError {
    pub error: String,
    pub cached: bool,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// An HTTP response.
///
/// The body can be read exactly once (`into_body`, `text`, `json`). A response
/// that is both returned to a caller and written to a cache must be duplicated
/// first; [`crate::domain::cache::CachePartition::put`] takes ownership.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    source: ResponseSource,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            source: ResponseSource::Network,
        }
    }

    /// Plain-text response produced locally
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self::synthetic(status, headers, body.into())
    }

    /// HTML response produced locally
    pub fn html(status: StatusCode, body: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        Self::synthetic(status, headers, body.into())
    }

    /// 503 with a short plain-text explanation
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::text(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// 503 with the machine-readable offline API payload
    pub fn offline_api_error(message: impl Into<String>) -> Self {
        let payload = OfflineApiError {
            error: message.into(),
            cached: false,
            timestamp: Utc::now().timestamp_millis(),
        };
        let body = serde_json::to_vec(&payload).unwrap_or_default();

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Self::synthetic(StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }

    fn synthetic(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            source: ResponseSource::Synthetic,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn source(&self) -> ResponseSource {
        self.source
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_stale(&self) -> bool {
        self.headers.contains_key(STALE_MARKER_HEADER)
    }

    /// Produces an independent copy whose body can be read separately
    pub fn duplicate(&self) -> Self {
        Self {
            status: self.status,
            headers: self.headers.clone(),
            body: Bytes::copy_from_slice(&self.body),
            source: self.source,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Annotates a cached response served in place of a failed network fetch
    pub fn with_stale_marker(self) -> Self {
        self.with_header(
            HeaderName::from_static(STALE_MARKER_HEADER),
            HeaderValue::from_static("true"),
        )
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    pub fn into_text(self) -> Result<String, DomainError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| DomainError::internal(format!("Response body is not UTF-8: {}", e)))
    }

    pub fn into_json<T: serde::de::DeserializeOwned>(self) -> Result<T, DomainError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| DomainError::internal(format!("Response body is not valid JSON: {}", e)))
    }

    /// Converts into a storable snapshot, consuming the body
    pub fn into_snapshot(self) -> StoredResponse {
        let headers = self
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        StoredResponse {
            status: self.status.as_u16(),
            headers,
            body: self.body,
            stored_at: Utc::now(),
        }
    }

    /// Rebuilds a response from a snapshot read out of a cache partition
    pub fn from_snapshot(snapshot: StoredResponse) -> Result<Self, DomainError> {
        let status = StatusCode::from_u16(snapshot.status).map_err(|e| {
            DomainError::cache(format!("Invalid cached status {}: {}", snapshot.status, e))
        })?;

        let mut headers = HeaderMap::new();

        for (name, value) in &snapshot.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| DomainError::cache(format!("Invalid cached header name: {}", e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| DomainError::cache(format!("Invalid cached header value: {}", e)))?;
            headers.append(name, value);
        }

        Ok(Self {
            status,
            headers,
            body: snapshot.body,
            source: ResponseSource::Cache,
        })
    }
}

/// Stored snapshot of a response (status, headers, body)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(with = "base64_body")]
    pub body: Bytes,
    pub stored_at: DateTime<Utc>,
}

mod base64_body {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network_response(body: &'static str) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/css"));
        Response::new(StatusCode::OK, headers, body)
    }

    #[test]
    fn test_duplicate_is_independently_readable() {
        let original = network_response("body { color: green; }");
        let copy = original.duplicate();

        assert_eq!(original.into_text().unwrap(), "body { color: green; }");
        assert_eq!(copy.into_text().unwrap(), "body { color: green; }");
    }

    #[test]
    fn test_snapshot_keeps_status_headers_and_body() {
        let snapshot = network_response("h1 {}").into_snapshot();
        assert_eq!(snapshot.status, 200);
        assert!(snapshot
            .headers
            .contains(&("content-type".to_string(), "text/css".to_string())));

        let restored = Response::from_snapshot(snapshot).unwrap();
        assert_eq!(restored.source(), ResponseSource::Cache);
        assert_eq!(restored.headers()[header::CONTENT_TYPE], "text/css");
        assert_eq!(restored.into_text().unwrap(), "h1 {}");
    }

    #[test]
    fn test_snapshot_serializes_body_as_base64() {
        let snapshot = network_response("abc").into_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"body\":\"YWJj\""));

        let parsed: StoredResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn test_offline_api_error_payload() {
        let response = Response::offline_api_error("Network unavailable");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.source(), ResponseSource::Synthetic);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let payload: OfflineApiError = response.into_json().unwrap();
        assert_eq!(payload.error, "Network unavailable");
        assert!(!payload.cached);
        assert!(payload.timestamp > 0);
    }

    #[test]
    fn test_stale_marker() {
        let response = network_response("x");
        assert!(!response.is_stale());

        let response = response.with_stale_marker();
        assert!(response.is_stale());
        assert_eq!(response.headers()[STALE_MARKER_HEADER], "true");
    }

    #[test]
    fn test_is_success() {
        assert!(network_response("").is_success());
        assert!(!Response::text(StatusCode::NOT_FOUND, "missing").is_success());
    }
}
