//! Intercepted request descriptor

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use url::Url;

use crate::domain::DomainError;

/// Fetch destination of a request, as reported by `Sec-Fetch-Dest`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    #[default]
    Empty,
    Other,
}

impl Destination {
    /// Parses a `Sec-Fetch-Dest` header value
    pub fn from_fetch_dest(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" | "iframe" | "frame" => Self::Document,
            "script" | "worker" | "sharedworker" | "serviceworker" => Self::Script,
            "style" => Self::Style,
            "image" => Self::Image,
            "font" => Self::Font,
            "manifest" => Self::Manifest,
            "empty" | "" => Self::Empty,
            _ => Self::Other,
        }
    }

    /// Destinations that are build artefacts and only change on deploy
    pub fn is_subresource_asset(&self) -> bool {
        matches!(self, Self::Script | Self::Style | Self::Image)
    }
}

/// Key of a cache entry. Only GET requests have one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheEntryKey(String);

impl CacheEntryKey {
    pub fn new(url: &Url) -> Self {
        Self(url.as_str().to_string())
    }

    /// Builds a key from a string previously produced by [`CacheEntryKey::as_str`]
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let url = Url::parse(value)
            .map_err(|e| DomainError::validation(format!("Invalid cache key '{}': {}", value, e)))?;
        Ok(Self::new(&url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheEntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A pending request crossing the interception boundary
#[derive(Debug, Clone)]
pub struct FetchRequest {
    method: Method,
    url: Url,
    destination: Destination,
    navigation: bool,
    headers: HeaderMap,
    body: Bytes,
}

impl FetchRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            destination: Destination::default(),
            navigation: false,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Parses `url` and builds a GET request
    pub fn get_str(url: &str) -> Result<Self, DomainError> {
        let url = Url::parse(url)
            .map_err(|e| DomainError::validation(format!("Invalid URL '{}': {}", url, e)))?;
        Ok(Self::get(url))
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Marks the request as a top-level page navigation
    pub fn navigate(mut self) -> Self {
        self.navigation = true;
        self.destination = Destination::Document;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    pub fn is_navigation(&self) -> bool {
        self.navigation
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Read-only requests are the only ones written to a cache
    pub fn is_read_only(&self) -> bool {
        self.method == Method::GET
    }

    pub fn cache_key(&self) -> Option<CacheEntryKey> {
        self.is_read_only().then(|| CacheEntryKey::new(&self.url))
    }
}
