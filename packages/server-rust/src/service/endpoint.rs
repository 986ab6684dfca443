//! Endpoint specifications: verb, route, and declared query/header bindings.
//!
//! An [`EndpointSpec`] is the method-level "annotation"; it becomes an
//! `EndpointDeclaration` once it is bound to a named handler through
//! `ServiceConfiguration::declare_endpoint`.

use waymark_core::{EndpointDeclaration, HttpMethod};

/// Method, route, and explicit parameter bindings of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    method: HttpMethod,
    route: Option<String>,
    query: Vec<String>,
    headers: Vec<String>,
}

impl EndpointSpec {
    #[must_use]
    pub fn new(method: HttpMethod, route: Option<&str>) -> Self {
        Self {
            method,
            route: route.map(str::to_string),
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    /// Query parameter names bound after the path parameters, in order.
    #[must_use]
    pub fn query<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.query = names.into_iter().map(Into::into).collect();
        self
    }

    /// Header names bound after the query parameters, in order.
    #[must_use]
    pub fn headers<I, N>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.headers = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Builds the declaration for the handler called `handler_name`.
    #[must_use]
    pub fn declare(self, handler_name: impl Into<String>) -> EndpointDeclaration {
        EndpointDeclaration::new(
            self.method,
            self.route.as_deref(),
            self.query,
            self.headers,
            handler_name,
        )
    }
}

/// General form taking any method. An empty route binds the endpoint to the
/// service's base route.
#[must_use]
pub fn request_mapping(method: HttpMethod, route: &str) -> EndpointSpec {
    EndpointSpec::new(method, Some(route))
}

#[must_use]
pub fn get(route: &str) -> EndpointSpec {
    request_mapping(HttpMethod::Get, route)
}

#[must_use]
pub fn post(route: &str) -> EndpointSpec {
    request_mapping(HttpMethod::Post, route)
}

#[must_use]
pub fn put(route: &str) -> EndpointSpec {
    request_mapping(HttpMethod::Put, route)
}

#[must_use]
pub fn delete(route: &str) -> EndpointSpec {
    request_mapping(HttpMethod::Delete, route)
}
