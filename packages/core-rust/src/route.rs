//! Route string normalization and path-parameter extraction.
//!
//! Route patterns use the `:name` segment syntax. A pattern is either empty or
//! starts with `/`; a base route is either empty or starts with `/` and has no
//! trailing slash, so joining the two never yields `//`.

/// Prefix that marks a path segment as a named parameter.
pub const PARAM_PREFIX: char = ':';

/// Normalizes an endpoint route pattern.
///
/// An empty pattern stays empty (the endpoint lives at its base route); any
/// other pattern is given a leading `/` if it lacks one.
///
/// # Examples
///
/// ```
/// use waymark_core::route::normalize_route;
///
/// assert_eq!(normalize_route(""), "");
/// assert_eq!(normalize_route("ping"), "/ping");
/// assert_eq!(normalize_route("/ping"), "/ping");
/// ```
#[must_use]
pub fn normalize_route(route: &str) -> String {
    if route.is_empty() || route.starts_with('/') {
        route.to_string()
    } else {
        format!("/{route}")
    }
}

/// Normalizes a service base route.
///
/// `""` and `"/"` both collapse to the empty prefix. Any other value gets a
/// leading slash and loses its trailing slashes.
#[must_use]
pub fn normalize_base_route(route: &str) -> String {
    let trimmed = route.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        normalize_route(trimmed)
    }
}

/// Joins a base route and an endpoint pattern into the route registered with
/// the host router.
///
/// Both sides are normalized first. A lone `/` pattern under a non-empty base
/// maps to the base itself, and an empty result becomes `/`.
///
/// # Examples
///
/// ```
/// use waymark_core::route::join_routes;
///
/// assert_eq!(join_routes("", "/ping"), "/ping");
/// assert_eq!(join_routes("/", "/ping"), "/ping");
/// assert_eq!(join_routes("/hi/", "ping"), "/hi/ping");
/// assert_eq!(join_routes("/hi", ""), "/hi");
/// assert_eq!(join_routes("", ""), "/");
/// ```
#[must_use]
pub fn join_routes(base: &str, route: &str) -> String {
    let base = normalize_base_route(base);
    let route = normalize_route(route);

    let joined = if route == "/" && !base.is_empty() {
        base
    } else {
        base + &route
    };

    if joined.is_empty() {
        "/".to_string()
    } else {
        joined
    }
}

/// Extracts the names of `:`-prefixed segments, in order of appearance.
///
/// A bare `:` segment yields an empty name; it is not rejected here.
///
/// # Examples
///
/// ```
/// use waymark_core::route::extract_path_param_names;
///
/// assert_eq!(
///     extract_path_param_names("/hello/:name/friend/:friend_name"),
///     vec!["name", "friend_name"],
/// );
/// assert!(extract_path_param_names("").is_empty());
/// ```
#[must_use]
pub fn extract_path_param_names(route: &str) -> Vec<String> {
    route
        .split('/')
        .filter_map(|segment| segment.strip_prefix(PARAM_PREFIX))
        .map(str::to_string)
        .collect()
}
