//! Gateway fallback: every request not addressed to the control surface
//! goes through the active worker, or straight to the network without one.

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tracing::{debug, warn};
use url::Url;

use super::state::AppState;
use super::types::ApiError;
use crate::domain::{self, Destination, DomainError, FetchOutcome, FetchRequest};
use crate::infrastructure::observability::record_fetch;

/// Request bodies above this size are rejected
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request = match to_fetch_request(&state.public_origin, request).await {
        Ok(request) => request,
        Err(e) => return ApiError::from(e).into_response(),
    };

    match state.registration.handle_fetch(&request).await {
        FetchOutcome::Responded {
            classification,
            response,
        } => {
            record_fetch(classification.as_str(), response.source().as_str());
            into_http(response)
        }
        FetchOutcome::Passthrough(reason) => {
            debug!(url = %request.url(), reason = ?reason, "Passing request through");
            forward(&state, &request).await
        }
    }
}

async fn forward(state: &AppState, request: &FetchRequest) -> Response {
    match state.network.fetch(request).await {
        Ok(response) => {
            record_fetch("passthrough", response.source().as_str());
            into_http(response)
        }
        Err(e) => {
            warn!(url = %request.url(), error = %e, "Passthrough request failed");
            record_fetch("passthrough", "error");
            (StatusCode::BAD_GATEWAY, format!("Bad gateway: {}", e)).into_response()
        }
    }
}

async fn to_fetch_request(
    public_origin: &Url,
    request: Request<Body>,
) -> Result<FetchRequest, DomainError> {
    let (parts, body) = request.into_parts();
    let url = request_url(public_origin, &parts.uri)?;

    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| DomainError::validation(format!("Failed to read request body: {}", e)))?;

    let destination = parts
        .headers
        .get("sec-fetch-dest")
        .and_then(|v| v.to_str().ok())
        .map(Destination::from_fetch_dest)
        .unwrap_or_default();
    let navigation = is_navigation(&parts.method, &parts.headers);

    let request = FetchRequest::new(parts.method, url)
        .with_destination(destination)
        .with_headers(parts.headers)
        .with_body(body);

    Ok(if navigation { request.navigate() } else { request })
}

/// Absolute-form targets are used as-is; origin-form targets belong to the app
fn request_url(public_origin: &Url, uri: &Uri) -> Result<Url, DomainError> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Url::parse(&uri.to_string())
            .map_err(|e| DomainError::validation(format!("Invalid request target '{}': {}", uri, e)));
    }

    let mut url = public_origin.clone();
    url.set_path(uri.path());
    url.set_query(uri.query());

    Ok(url)
}

fn is_navigation(method: &Method, headers: &HeaderMap) -> bool {
    if let Some(mode) = headers.get("sec-fetch-mode").and_then(|v| v.to_str().ok()) {
        return mode.eq_ignore_ascii_case("navigate");
    }

    method == Method::GET
        && headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html"))
}

fn into_http(response: domain::Response) -> Response {
    let (status, headers, body) = response.into_parts();

    let mut out = Response::new(Body::from(body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("http://localhost:8080").unwrap()
    }

    #[test]
    fn test_origin_form_resolves_against_public_origin() {
        let uri: Uri = "/api/stocks?symbol=SBER".parse().unwrap();
        assert_eq!(
            request_url(&origin(), &uri).unwrap().as_str(),
            "http://localhost:8080/api/stocks?symbol=SBER"
        );
    }

    #[test]
    fn test_scheme_relative_path_stays_on_origin() {
        let uri: Uri = "//evil.example/x".parse().unwrap();
        let url = request_url(&origin(), &uri).unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
    }

    #[test]
    fn test_absolute_form_is_kept() {
        let uri: Uri = "https://www.cbr-xml-daily.ru/daily_json.js".parse().unwrap();
        assert_eq!(
            request_url(&origin(), &uri).unwrap().as_str(),
            "https://www.cbr-xml-daily.ru/daily_json.js"
        );
    }

    #[test]
    fn test_navigation_detection() {
        let mut headers = HeaderMap::new();
        headers.insert("sec-fetch-mode", "navigate".parse().unwrap());
        assert!(is_navigation(&Method::GET, &headers));

        let mut headers = HeaderMap::new();
        headers.insert("sec-fetch-mode", "cors".parse().unwrap());
        headers.insert(header::ACCEPT, "text/html".parse().unwrap());
        assert!(!is_navigation(&Method::GET, &headers));

        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, "text/html,application/xhtml+xml".parse().unwrap());
        assert!(is_navigation(&Method::GET, &headers));
        assert!(!is_navigation(&Method::POST, &headers));

        assert!(!is_navigation(&Method::GET, &HeaderMap::new()));
    }
}
