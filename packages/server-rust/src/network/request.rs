//! Host-independent view of an inbound request.

use std::collections::HashMap;

use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use serde_json::Value;
use waymark_core::HttpMethod;

/// The request as seen by middleware, synthesized handlers, and error
/// handlers.
///
/// Path parameters and query values are plain strings keyed by name. Header
/// lookup is case-insensitive. The body is the already parsed JSON value, or
/// `None` when the request carried no body.
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpMethod,
    path: String,
    path_params: HashMap<String, String>,
    query: HashMap<String, String>,
    headers: HeaderMap,
    body: Option<Value>,
}

impl Request {
    /// Creates an empty request for the given method and path.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: HashMap::new(),
            query: HashMap::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(name.into(), value.into());
        self
    }

    /// Adds a query value. The first value for a name wins.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(name.into()).or_insert_with(|| value.into());
        self
    }

    /// Adds a header. Invalid names or values are dropped.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Value of the named path parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Value of the named query parameter.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Value of the named header, looked up case-insensitively. Headers that
    /// are not valid visible ASCII read as absent.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Replaces the parsed body. Middleware uses this to rewrite payloads
    /// before the handler sees them.
    pub fn set_body(&mut self, body: Option<Value>) {
        self.body = body;
    }
}
