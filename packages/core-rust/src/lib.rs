//! Waymark Core: route declarations, path parameters, body unwrapping, and
//! failure values shared by the registry and the binding compiler.

pub mod body;
pub mod declaration;
pub mod error;
pub mod failure;
pub mod method;
pub mod route;

pub use body::{effective_body, unwrap_body, BodyPolicy};
pub use declaration::EndpointDeclaration;
pub use error::RouteError;
pub use failure::Failure;
pub use method::HttpMethod;
pub use route::{extract_path_param_names, join_routes, normalize_base_route, normalize_route};
