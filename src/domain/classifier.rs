//! Request classification

use serde::Serialize;
use url::{Origin, Url};

use super::fetch::FetchRequest;
use super::DomainError;

/// Category used to select a caching strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestClassification {
    StaticAsset,
    ApiCall,
    Navigation,
    Other,
}

impl RequestClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StaticAsset => "static-asset",
            Self::ApiCall => "api-call",
            Self::Navigation => "navigation",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for RequestClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a request is forwarded without interception
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughReason {
    /// Third-party request that is not market-data API traffic
    CrossOrigin,
    /// Writes outside the API surface are never cache-considered
    NonGetMethod,
    /// No worker version controls the gateway yet
    NoController,
}

impl PassthroughReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CrossOrigin => "cross-origin",
            Self::NonGetMethod => "non-get",
            Self::NoController => "no-controller",
        }
    }
}

/// Result of classifying one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interception {
    Intercept(RequestClassification),
    Passthrough(PassthroughReason),
}

/// Classifier inputs: own origin, API allow-list and path prefixes
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub app_origin: Url,
    pub api_hosts: Vec<String>,
    pub api_path_prefixes: Vec<String>,
    pub static_path_prefixes: Vec<String>,
}

impl ClassifierConfig {
    pub fn new(app_origin: Url) -> Self {
        Self {
            app_origin,
            api_hosts: Vec::new(),
            api_path_prefixes: vec!["/api/".to_string()],
            static_path_prefixes: vec!["/static/".to_string()],
        }
    }

    pub fn with_api_hosts(mut self, hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.api_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_api_prefixes(
        mut self,
        prefixes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.api_path_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_static_prefixes(
        mut self,
        prefixes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.static_path_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }
}

/// Deterministic request classifier
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Origin,
    api_hosts: Vec<String>,
    api_path_prefixes: Vec<String>,
    static_path_prefixes: Vec<String>,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, DomainError> {
        let origin = config.app_origin.origin();

        if !origin.is_tuple() {
            return Err(DomainError::configuration(format!(
                "Application origin '{}' must be an http(s) URL",
                config.app_origin
            )));
        }

        for prefix in config
            .api_path_prefixes
            .iter()
            .chain(config.static_path_prefixes.iter())
        {
            if !prefix.starts_with('/') {
                return Err(DomainError::configuration(format!(
                    "Path prefix '{}' must start with '/'",
                    prefix
                )));
            }
        }

        Ok(Self {
            origin,
            api_hosts: config
                .api_hosts
                .into_iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            api_path_prefixes: config.api_path_prefixes,
            static_path_prefixes: config.static_path_prefixes,
        })
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin
    }

    pub fn classify(&self, request: &FetchRequest) -> Interception {
        let url = request.url();

        if self.is_api_call(url) {
            return Interception::Intercept(RequestClassification::ApiCall);
        }

        if !self.is_same_origin(url) {
            return Interception::Passthrough(PassthroughReason::CrossOrigin);
        }

        if !request.is_read_only() {
            return Interception::Passthrough(PassthroughReason::NonGetMethod);
        }

        let path = url.path();

        if request.destination().is_subresource_asset()
            || self
                .static_path_prefixes
                .iter()
                .any(|p| path.starts_with(p.as_str()))
        {
            return Interception::Intercept(RequestClassification::StaticAsset);
        }

        if request.is_navigation() {
            return Interception::Intercept(RequestClassification::Navigation);
        }

        Interception::Intercept(RequestClassification::Other)
    }

    fn is_api_call(&self, url: &Url) -> bool {
        if let Some(host) = url.host_str() {
            let host = host.to_ascii_lowercase();

            let listed = self.api_hosts.iter().any(|allowed| {
                host == *allowed
                    || host
                        .strip_suffix(allowed.as_str())
                        .is_some_and(|rest| rest.ends_with('.'))
            });

            if listed {
                return true;
            }
        }

        self.api_path_prefixes
            .iter()
            .any(|p| url.path().starts_with(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fetch::Destination;
    use http::Method;

    fn classifier() -> Classifier {
        let config = ClassifierConfig::new(Url::parse("http://localhost:8080").unwrap())
            .with_api_hosts(["www.cbr-xml-daily.ru", "alphavantage.co"]);
        Classifier::new(config).unwrap()
    }

    fn get(url: &str) -> FetchRequest {
        FetchRequest::get_str(url).unwrap()
    }

    fn intercept(c: RequestClassification) -> Interception {
        Interception::Intercept(c)
    }

    #[test]
    fn test_representative_urls() {
        let classifier = classifier();

        assert_eq!(
            classifier.classify(&get("http://localhost:8080/static/css/main.css")),
            intercept(RequestClassification::StaticAsset)
        );
        assert_eq!(
            classifier.classify(&get("http://localhost:8080/api/cbr/currencies")),
            intercept(RequestClassification::ApiCall)
        );
        assert_eq!(
            classifier.classify(&get("http://localhost:8080/").navigate()),
            intercept(RequestClassification::Navigation)
        );
        assert_eq!(
            classifier.classify(&get("http://localhost:8080/random-xhr")),
            intercept(RequestClassification::Other)
        );
    }

    #[test]
    fn test_api_rule_wins_over_static_destination() {
        let request = get("http://localhost:8080/api/stocks/chart.png")
            .with_destination(Destination::Image);

        assert_eq!(
            classifier().classify(&request),
            intercept(RequestClassification::ApiCall)
        );
    }

    #[test]
    fn test_destination_marks_static_asset() {
        let request = get("http://localhost:8080/logo.png").with_destination(Destination::Image);
        assert_eq!(
            classifier().classify(&request),
            intercept(RequestClassification::StaticAsset)
        );

        let request = get("http://localhost:8080/bundle.js").with_destination(Destination::Script);
        assert_eq!(
            classifier().classify(&request),
            intercept(RequestClassification::StaticAsset)
        );
    }

    #[test]
    fn test_cross_origin_api_host_is_intercepted() {
        let classifier = classifier();

        assert_eq!(
            classifier.classify(&get("https://www.cbr-xml-daily.ru/daily_json.js")),
            intercept(RequestClassification::ApiCall)
        );
        assert_eq!(
            classifier.classify(&get("https://www.alphavantage.co/query?function=TIME_SERIES")),
            intercept(RequestClassification::ApiCall)
        );
    }

    #[test]
    fn test_cross_origin_non_api_is_passed_through() {
        let classifier = classifier();

        let font = get("https://fonts.gstatic.com/s/roboto.woff2").with_destination(Destination::Font);
        assert_eq!(
            classifier.classify(&font),
            Interception::Passthrough(PassthroughReason::CrossOrigin)
        );

        let script = get("https://cdn.example.com/static/lib.js").with_destination(Destination::Script);
        assert_eq!(
            classifier.classify(&script),
            Interception::Passthrough(PassthroughReason::CrossOrigin)
        );
    }

    #[test]
    fn test_api_prefix_applies_to_any_origin() {
        let classifier = classifier();

        assert_eq!(
            classifier.classify(&get("https://market.example.com/api/quotes")),
            intercept(RequestClassification::ApiCall)
        );

        let post = get("https://market.example.com/api/orders").with_method(Method::POST);
        assert_eq!(
            classifier.classify(&post),
            intercept(RequestClassification::ApiCall)
        );

        assert_eq!(
            classifier.classify(&get("https://market.example.com/apiary/logo.png")),
            Interception::Passthrough(PassthroughReason::CrossOrigin)
        );
    }

    #[test]
    fn test_host_suffix_must_be_a_subdomain() {
        let classifier = classifier();

        assert_eq!(
            classifier.classify(&get("https://evilalphavantage.co/query")),
            Interception::Passthrough(PassthroughReason::CrossOrigin)
        );
    }

    #[test]
    fn test_different_port_is_cross_origin() {
        assert_eq!(
            classifier().classify(&get("http://localhost:3000/static/js/bundle.js")),
            Interception::Passthrough(PassthroughReason::CrossOrigin)
        );
    }

    #[test]
    fn test_non_get_requests() {
        let classifier = classifier();

        let post_api = get("http://localhost:8080/api/goals").with_method(Method::POST);
        assert_eq!(
            classifier.classify(&post_api),
            intercept(RequestClassification::ApiCall)
        );

        let post_form = get("http://localhost:8080/feedback").with_method(Method::POST);
        assert_eq!(
            classifier.classify(&post_form),
            Interception::Passthrough(PassthroughReason::NonGetMethod)
        );
    }

    #[test]
    fn test_invalid_config() {
        let config = ClassifierConfig::new(Url::parse("http://localhost:8080").unwrap())
            .with_api_prefixes(["api/"]);
        assert!(Classifier::new(config).is_err());

        let config = ClassifierConfig::new(Url::parse("file:///tmp/app").unwrap());
        assert!(Classifier::new(config).is_err());
    }
}
