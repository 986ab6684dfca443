//! [`HostRouter`] implementation backed by an `axum::Router`.
//!
//! Path parameters are captured positionally: every `:name` segment becomes
//! `{pN}` in the axum path, so `/items/:id` and `/items/:key` share one axum
//! path. axum's matcher prefers static segments, while registrations must
//! resolve first-registered-wins; each axum path therefore dispatches through
//! the ordered list of registrations whose shape overlaps it and picks the
//! first one that matches the request.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, Query};
use axum::response::{IntoResponse, Response};
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::{Json, Router};
use http::header::CONTENT_TYPE;
use http::request::Parts;
use http::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, warn};
use waymark_core::route::PARAM_PREFIX;
use waymark_core::{normalize_route, HttpMethod};

use super::chain;
use super::host::{ChainLink, HostRouter};
use super::request::Request;

/// Default maximum request body size (2 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
}

fn parse_segments(route: &str) -> Vec<Segment> {
    route
        .split('/')
        .map(|segment| match segment.strip_prefix(PARAM_PREFIX) {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Static(segment.to_string()),
        })
        .collect()
}

/// Some request path matches both shapes.
fn overlaps(a: &[Segment], b: &[Segment]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (Segment::Static(x), Segment::Static(y)) => x == y,
            _ => true,
        })
}

/// Every request path matching `later` also matches `earlier`.
fn covers(earlier: &[Segment], later: &[Segment]) -> bool {
    earlier.len() == later.len()
        && earlier.iter().zip(later).all(|pair| match pair {
            (Segment::Param(_), _) => true,
            (Segment::Static(x), Segment::Static(y)) => x == y,
            (Segment::Static(_), Segment::Param(_)) => false,
        })
}

struct Registration {
    method: HttpMethod,
    segments: Vec<Segment>,
    chain: Arc<[ChainLink]>,
}

impl Registration {
    /// Named parameters if `values` (one per path segment) match this route.
    fn capture(&self, values: &[String]) -> Option<Vec<(String, String)>> {
        if values.len() != self.segments.len() {
            return None;
        }
        let mut params = Vec::new();
        for (segment, value) in self.segments.iter().zip(values) {
            match segment {
                Segment::Static(literal) if literal != value => return None,
                Segment::Static(_) => {}
                Segment::Param(name) => params.push((name.clone(), value.clone())),
            }
        }
        Some(params)
    }
}

/// Collects chain registrations and builds an axum router from them.
///
/// A second registration of the same method and route shape is skipped with a
/// warning; the first one keeps serving. Overlapping shapes are resolved per
/// request in registration order.
pub struct AxumHost {
    body_limit: usize,
    registrations: Vec<Arc<Registration>>,
    registered: HashSet<(HttpMethod, String)>,
}

impl AxumHost {
    #[must_use]
    pub fn new(body_limit: usize) -> Self {
        Self {
            body_limit,
            registrations: Vec::new(),
            registered: HashSet::new(),
        }
    }

    /// Number of accepted `(method, route)` registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Builds the router. Unmatched requests fall through to axum's 404.
    #[must_use]
    pub fn into_router(self) -> Router {
        let mut shapes: Vec<(String, Arc<[Segment]>)> = Vec::new();
        let mut seen = HashSet::new();
        for registration in &self.registrations {
            let path = to_axum_path(&render(&registration.segments));
            if seen.insert(path.clone()) {
                shapes.push((path, registration.segments.clone().into()));
            }
        }

        let body_limit = self.body_limit;
        shapes
            .into_iter()
            .fold(Router::new(), |router, (path, shape)| {
                let method_router = HttpMethod::ALL.into_iter().fold(
                    MethodRouter::new(),
                    |method_router, method| {
                        let candidates: Arc<[Arc<Registration>]> = self
                            .registrations
                            .iter()
                            .filter(|r| r.method == method && overlaps(&r.segments, &shape))
                            .cloned()
                            .collect();
                        if candidates.is_empty() {
                            return method_router;
                        }
                        let shape = Arc::clone(&shape);
                        let handler = move |request: axum::extract::Request| {
                            let shape = Arc::clone(&shape);
                            let candidates = Arc::clone(&candidates);
                            async move {
                                dispatch(request, method, &shape, &candidates, body_limit).await
                            }
                        };
                        method_router.merge(on(method_filter(method), handler))
                    },
                );
                router.route(&path, method_router)
            })
    }
}

impl Default for AxumHost {
    fn default() -> Self {
        Self::new(DEFAULT_BODY_LIMIT)
    }
}

impl HostRouter for AxumHost {
    fn register(&mut self, method: HttpMethod, route: &str, chain: Vec<ChainLink>) {
        let route = match normalize_route(route) {
            normalized if normalized.is_empty() => "/".to_string(),
            normalized => normalized,
        };
        let route = route.as_str();

        if !self.registered.insert((method, to_axum_path(route))) {
            warn!(method = %method, route, "Duplicate route registration skipped");
            return;
        }

        let segments = parse_segments(route);
        if self
            .registrations
            .iter()
            .any(|earlier| earlier.method == method && covers(&earlier.segments, &segments))
        {
            warn!(method = %method, route, "Route is shadowed by an earlier registration");
        }

        self.registrations.push(Arc::new(Registration {
            method,
            segments,
            chain: chain.into(),
        }));
    }
}

fn render(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Static(literal) => literal.clone(),
            Segment::Param(name) => format!("{PARAM_PREFIX}{name}"),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Translates a `:name` route into an axum path with positional captures.
///
/// Literal braces in static segments are escaped.
#[must_use]
pub fn to_axum_path(route: &str) -> String {
    let mut position = 0;
    route
        .split('/')
        .map(|segment| {
            if segment.starts_with(PARAM_PREFIX) {
                let capture = format!("{{p{position}}}");
                position += 1;
                capture
            } else {
                segment.replace('{', "{{").replace('}', "}}")
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
        HttpMethod::Delete => MethodFilter::DELETE,
        HttpMethod::Patch => MethodFilter::PATCH,
        HttpMethod::Head => MethodFilter::HEAD,
        HttpMethod::Options => MethodFilter::OPTIONS,
    }
}

fn reject(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

fn is_json(parts: &Parts) -> bool {
    parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .is_some_and(|mime| mime == "application/json" || mime.ends_with("+json"))
}

/// Picks the first candidate matching the request, converts the request
/// into a [`Request`] and runs that candidate's chain on it.
async fn dispatch(
    request: axum::extract::Request,
    method: HttpMethod,
    shape: &[Segment],
    candidates: &[Arc<Registration>],
    body_limit: usize,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let mut captures = Vec::new();
    if shape.iter().any(|segment| matches!(segment, Segment::Param(_))) {
        match Path::<Vec<(String, String)>>::from_request_parts(&mut parts, &()).await {
            Ok(Path(pairs)) => captures = pairs.into_iter().map(|(_, value)| value).collect(),
            Err(rejection) => return rejection.into_response(),
        }
    }
    let mut captures = captures.into_iter();
    let values: Vec<String> = shape
        .iter()
        .map(|segment| match segment {
            Segment::Static(literal) => literal.clone(),
            Segment::Param(_) => captures.next().unwrap_or_default(),
        })
        .collect();

    let Some((registration, params)) = candidates
        .iter()
        .find_map(|candidate| candidate.capture(&values).map(|params| (candidate, params)))
    else {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    };

    let mut req = Request::new(method, parts.uri.path()).with_headers(parts.headers.clone());
    for (name, value) in params {
        req = req.with_path_param(name, value);
    }

    if let Ok(Query(pairs)) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri) {
        for (name, value) in pairs {
            req = req.with_query(name, value);
        }
    }

    // Any read failure, including the limit, is reported as 413.
    let bytes = match axum::body::to_bytes(body, body_limit).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return reject(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("failed to read request body: {err}"),
            )
        }
    };
    if !bytes.is_empty() && is_json(&parts) {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => req.set_body(Some(value)),
            Err(err) => {
                debug!(path = %parts.uri.path(), error = %err, "Rejected malformed JSON body");
                return reject(StatusCode::BAD_REQUEST, format!("invalid JSON body: {err}"));
            }
        }
    }

    chain::run(&registration.chain, &mut req).await.into_response()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use tower::ServiceExt;
    use waymark_core::Failure;

    use super::*;
    use crate::network::host::RequestHandler;
    use crate::network::response::ResponseWriter;

    /// Echoes everything the request carried as JSON.
    struct Echo(&'static str);

    #[async_trait]
    impl RequestHandler for Echo {
        async fn handle(&self, req: &Request, res: &mut ResponseWriter) -> Result<(), Failure> {
            res.json(json!({
                "tag": self.0,
                "path": req.path(),
                "id": req.param("id"),
                "key": req.param("key"),
                "message": req.query("message"),
                "header": req.header("x-custom"),
                "body": req.body(),
            }));
            Ok(())
        }
    }

    fn echo(tag: &'static str) -> Vec<ChainLink> {
        vec![ChainLink::Handler(Arc::new(Echo(tag)))]
    }

    async fn call(router: Router, request: http::Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn get(uri: &str) -> http::Request<Body> {
        http::Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> http::Request<Body> {
        http::Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn axum_paths_use_positional_captures() {
        assert_eq!(to_axum_path("/hello/:name"), "/hello/{p0}");
        assert_eq!(to_axum_path("/a/:x/b/:y"), "/a/{p0}/b/{p1}");
        assert_eq!(to_axum_path("/a/:"), "/a/{p0}");
        assert_eq!(to_axum_path("/"), "/");
        assert_eq!(to_axum_path("/lit/{x}"), "/lit/{{x}}");
    }

    #[tokio::test]
    async fn path_and_query_reach_the_chain() {
        let mut host = AxumHost::default();
        host.register(HttpMethod::Get, "/items/:id", echo("items"));
        let (status, body) = call(host.into_router(), get("/items/42?message=hi&message=ignored")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "42");
        assert_eq!(body["message"], "hi");
        assert_eq!(body["path"], "/items/42");
    }

    #[tokio::test]
    async fn json_body_is_parsed() {
        let mut host = AxumHost::default();
        host.register(HttpMethod::Post, "/items", echo("items"));
        let (status, body) = call(host.into_router(), post_json("/items", r#"{"message":"m"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["body"], json!({"message": "m"}));
    }

    #[tokio::test]
    async fn invalid_json_is_400() {
        let mut host = AxumHost::default();
        host.register(HttpMethod::Post, "/items", echo("items"));
        let (status, body) = call(host.into_router(), post_json("/items", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().starts_with("invalid JSON body"));
    }

    #[tokio::test]
    async fn non_json_body_is_ignored() {
        let mut host = AxumHost::default();
        host.register(HttpMethod::Post, "/items", echo("items"));
        let request = http::Request::builder()
            .method("POST")
            .uri("/items")
            .header(CONTENT_TYPE, "text/plain")
            .body(Body::from("plain"))
            .unwrap();
        let (_, body) = call(host.into_router(), request).await;
        assert_eq!(body["body"], Value::Null);
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let mut host = AxumHost::new(8);
        host.register(HttpMethod::Post, "/items", echo("items"));
        let (status, _) = call(
            host.into_router(),
            post_json("/items", r#"{"message":"far too long"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn headers_are_case_insensitive() {
        let mut host = AxumHost::default();
        host.register(HttpMethod::Get, "/h", echo("h"));
        let request = http::Request::builder()
            .uri("/h")
            .header("X-Custom", "value")
            .body(Body::empty())
            .unwrap();
        let (_, body) = call(host.into_router(), request).await;
        assert_eq!(body["header"], "value");
    }

    #[tokio::test]
    async fn duplicate_registration_keeps_first() {
        let mut host = AxumHost::default();
        host.register(HttpMethod::Get, "/items/:id", echo("first"));
        host.register(HttpMethod::Get, "/items/:key", echo("second"));
        assert_eq!(host.len(), 1);
        let (_, body) = call(host.into_router(), get("/items/1")).await;
        assert_eq!(body["tag"], "first");
        assert_eq!(body["id"], "1");
    }

    #[tokio::test]
    async fn methods_share_a_path_with_their_own_names() {
        let mut host = AxumHost::default();
        host.register(HttpMethod::Get, "/items/:id", echo("get"));
        host.register(HttpMethod::Delete, "/items/:key", echo("delete"));
        let router = host.into_router();

        let (_, body) = call(router.clone(), get("/items/7")).await;
        assert_eq!(body["tag"], "get");
        assert_eq!(body["id"], "7");

        let request = http::Request::builder()
            .method("DELETE")
            .uri("/items/7")
            .body(Body::empty())
            .unwrap();
        let (_, body) = call(router, request).await;
        assert_eq!(body["tag"], "delete");
        assert_eq!(body["key"], "7");
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let mut host = AxumHost::default();
        host.register(HttpMethod::Get, "/known", echo("known"));
        let (status, _) = call(host.into_router(), get("/unknown")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn relative_route_gets_leading_slash() {
        let mut host = AxumHost::default();
        host.register(HttpMethod::Get, "ping", echo("ping"));
        let (status, _) = call(host.into_router(), get("/ping")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn empty_route_registers_root() {
        let mut host = AxumHost::default();
        host.register(HttpMethod::Get, "", echo("root"));
        let (status, body) = call(host.into_router(), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tag"], "root");
    }

    #[test]
    fn shapes_overlap_and_cover() {
        let param = parse_segments("/items/:id");
        let special = parse_segments("/items/special");
        let nested = parse_segments("/items/:id/tags");
        assert!(overlaps(&param, &special));
        assert!(!overlaps(&param, &nested));
        assert!(covers(&param, &special));
        assert!(!covers(&special, &param));
    }

    #[tokio::test]
    async fn earlier_param_route_wins_over_later_static_route() {
        let mut host = AxumHost::default();
        host.register(HttpMethod::Get, "/items/:id", echo("first"));
        host.register(HttpMethod::Get, "/items/special", echo("second"));
        assert_eq!(host.len(), 2);
        let router = host.into_router();

        let (status, body) = call(router.clone(), get("/items/special")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tag"], "first");
        assert_eq!(body["id"], "special");

        let (_, body) = call(router, get("/items/7")).await;
        assert_eq!(body["tag"], "first");
        assert_eq!(body["id"], "7");
    }

    #[tokio::test]
    async fn earlier_static_route_wins_over_later_param_route() {
        let mut host = AxumHost::default();
        host.register(HttpMethod::Get, "/items/special", echo("first"));
        host.register(HttpMethod::Get, "/items/:id", echo("second"));
        let router = host.into_router();

        let (_, body) = call(router.clone(), get("/items/special")).await;
        assert_eq!(body["tag"], "first");

        let (_, body) = call(router, get("/items/8")).await;
        assert_eq!(body["tag"], "second");
        assert_eq!(body["id"], "8");
    }

    #[tokio::test]
    async fn partially_overlapping_routes_resolve_in_order() {
        let mut host = AxumHost::default();
        host.register(HttpMethod::Get, "/a/:id/c", echo("first"));
        host.register(HttpMethod::Get, "/a/b/:key", echo("second"));
        let router = host.into_router();

        let (_, body) = call(router.clone(), get("/a/b/c")).await;
        assert_eq!(body["tag"], "first");
        assert_eq!(body["id"], "b");

        let (_, body) = call(router, get("/a/b/d")).await;
        assert_eq!(body["tag"], "second");
        assert_eq!(body["key"], "d");
    }

    #[tokio::test]
    async fn static_path_of_another_method_does_not_hide_param_route() {
        let mut host = AxumHost::default();
        host.register(HttpMethod::Post, "/items/special", echo("post"));
        host.register(HttpMethod::Get, "/items/:id", echo("get"));
        let (status, body) = call(host.into_router(), get("/items/special")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tag"], "get");
        assert_eq!(body["id"], "special");
    }

    #[tokio::test]
    async fn unregistered_method_is_405() {
        let mut host = AxumHost::default();
        host.register(HttpMethod::Post, "/items", echo("items"));
        let (status, _) = call(host.into_router(), get("/items")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
