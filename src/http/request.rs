//! Request extraction.
//!
//! # Responsibilities
//! - Turn an HTTP request into the pipeline's [`InboundRequest`]
//! - Pick the endpoint's query parameter out of the query string
//!
//! # Design Decisions
//! - A missing parameter becomes the empty string, which the greeting
//!   endpoint then reports as too short
//! - Host falls back to the URI authority when the header is absent
//! - A repeated parameter resolves to its first value

use axum::http::{header, HeaderMap, Method, Uri};

use crate::pipeline::{Endpoint, InboundRequest};

/// Header carrying the correlation id back to the caller.
pub const X_CORRELATION_ID: &str = "x-correlation-id";

pub fn inbound_request(
    endpoint: Endpoint,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    query: &[(String, String)],
) -> InboundRequest {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_default();

    InboundRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        uri: uri
            .path_and_query()
            .map(|pq| pq.to_string())
            .unwrap_or_else(|| uri.path().to_string()),
        host,
        input: query
            .iter()
            .find(|(key, _)| key == endpoint.query_param())
            .map(|(_, value)| value.clone())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_fields() {
        let uri: Uri = "/?name=Al&x=1".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "example.com".parse().unwrap());
        let query = vec![
            ("name".to_string(), "Al".to_string()),
            ("x".to_string(), "1".to_string()),
        ];

        let req = inbound_request(Endpoint::Greeting, &Method::GET, &uri, &headers, &query);
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/");
        assert_eq!(req.uri, "/?name=Al&x=1");
        assert_eq!(req.host, "example.com");
        assert_eq!(req.input, "Al");
    }

    #[test]
    fn test_uses_endpoint_parameter() {
        let uri: Uri = "http://svc:8080/another?name=ignored".parse().unwrap();
        let query = vec![("name".to_string(), "ignored".to_string())];

        let req = inbound_request(Endpoint::Another, &Method::GET, &uri, &HeaderMap::new(), &query);
        assert_eq!(req.input, "");
        assert_eq!(req.host, "svc:8080");
        assert_eq!(req.uri, "/another?name=ignored");
    }

    #[test]
    fn test_first_of_repeated_parameter_wins() {
        let uri: Uri = "/?name=A&name=Alice".parse().unwrap();
        let query = vec![
            ("name".to_string(), "A".to_string()),
            ("name".to_string(), "Alice".to_string()),
        ];

        let req = inbound_request(Endpoint::Greeting, &Method::GET, &uri, &HeaderMap::new(), &query);
        assert_eq!(req.input, "A");
    }
}
