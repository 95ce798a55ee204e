//! Request model handed to middleware, handlers and error handlers.

use std::sync::Arc;

use http::{Extensions, HeaderMap, Method};
use serde_json::Value;

use crate::ids::RequestId;
use crate::router::ParamVec;

/// An incoming request as seen by the routing layer.
///
/// The transport fills `method`, `path`, `query_string`, `headers` and `raw_body`.
/// The parsing middleware fills `query_params` and `body`; the dispatcher fills
/// `path_params` once a route matched. `extensions` is free for middleware to
/// attach typed data (an authenticated user, a rate-limit bucket...).
#[derive(Debug)]
pub struct Request {
    /// Unique request ID for tracing and correlation
    pub request_id: RequestId,
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Request path without the query string
    pub path: String,
    /// Raw query string (without the leading `?`)
    pub query_string: Option<String>,
    /// Request headers
    pub headers: HeaderMap,
    /// Unparsed request body
    pub raw_body: Vec<u8>,
    /// Parsed body (JSON value, or an object for URL-encoded forms)
    pub body: Option<Value>,
    /// Query string parameters, filled by the query parser
    pub query_params: ParamVec,
    /// Path parameters extracted from the matched route
    pub path_params: ParamVec,
    /// Typed per-request storage for middleware
    pub extensions: Extensions,
}

/// Set by the transport when the body was cut off at the configured limit.
/// The dispatcher turns it into a 413.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BodyLimitExceeded {
    pub limit: usize,
    /// Declared `Content-Length`, or the bytes read when none was sent
    pub actual: usize,
}

impl Request {
    /// Build a request from a method and a path that may carry a query string.
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query_string) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (uri, None),
        };
        let path = if path.is_empty() { "/" } else { path };
        Self {
            request_id: RequestId::new(),
            method,
            path: path.to_string(),
            query_string,
            headers: HeaderMap::new(),
            raw_body: Vec::new(),
            body: None,
            query_params: ParamVec::new(),
            path_params: ParamVec::new(),
            extensions: Extensions::new(),
        }
    }

    /// Builder helper: append a header. Invalid names or values are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            http::header::HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Builder helper: set the raw body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.raw_body = body.into();
        self
    }

    /// Get a path parameter by name
    ///
    /// Uses "last write wins" semantics: if duplicate parameter names exist
    /// at different path depths, returns the last occurrence.
    #[inline]
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name (`?limit=10&limit=20` yields `20`).
    #[inline]
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header value as a string
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Media type of the body, lowercased and without parameters.
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type").map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    pub(crate) fn push_query_param(&mut self, name: &str, value: String) {
        self.query_params.push((Arc::from(name), value));
    }
}
