//! Endpoint declarations: one per declared service method.

use serde::{Deserialize, Serialize};

use crate::method::HttpMethod;
use crate::route::{extract_path_param_names, normalize_route};

/// Describes how one service method is exposed over HTTP.
///
/// At dispatch time, arguments are bound positionally in the order
/// `path_param_names ++ query_param_names ++ header_names ++ [body]`. Names
/// are only used to look values up in the request; they are never matched
/// against the method's parameter names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDeclaration {
    pub http_method: HttpMethod,
    /// Empty, or a pattern starting with `/`.
    pub route_pattern: String,
    pub handler_name: String,
    pub path_param_names: Vec<String>,
    pub query_param_names: Vec<String>,
    pub header_names: Vec<String>,
}

impl EndpointDeclaration {
    /// Builds a declaration, normalizing the route and extracting its path
    /// parameter names. A missing route is treated as empty.
    #[must_use]
    pub fn new(
        http_method: HttpMethod,
        route: Option<&str>,
        query_param_names: Vec<String>,
        header_names: Vec<String>,
        handler_name: impl Into<String>,
    ) -> Self {
        let route_pattern = normalize_route(route.unwrap_or_default());
        let path_param_names = extract_path_param_names(&route_pattern);
        Self {
            http_method,
            route_pattern,
            handler_name: handler_name.into(),
            path_param_names,
            query_param_names,
            header_names,
        }
    }

    /// Number of positional arguments bound from the request, excluding the
    /// optional trailing body.
    #[must_use]
    pub fn bound_arity(&self) -> usize {
        self.path_param_names.len() + self.query_param_names.len() + self.header_names.len()
    }
}
