//! Transport-level Tower layers wrapped around the compiled router.
//!
//! Middleware ordering follows the outer-to-inner convention: the first
//! layer listed is the outermost (processes the request first on the way
//! in, and the response last on the way out).

use axum::http::header::HeaderName;
use axum::http::Method;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;

/// The composed Tower layer type produced by [`build_http_layers`].
type HttpLayers = tower::layer::util::Stack<
    PropagateRequestIdLayer,
    tower::layer::util::Stack<
        CorsLayer,
        tower::layer::util::Stack<
            RequestBodyLimitLayer,
            tower::layer::util::Stack<
                TraceLayer<
                    tower_http::classify::SharedClassifier<
                        tower_http::classify::ServerErrorsAsFailures,
                    >,
                >,
                tower::layer::util::Stack<
                    SetRequestIdLayer<MakeRequestUuid>,
                    tower::layer::util::Identity,
                >,
            >,
        >,
    >,
>;

/// Builds the HTTP-level middleware stack from the server configuration.
///
/// **Middleware ordering (outermost to innermost):**
/// 1. `SetRequestId` -- assigns a UUID v4 `X-Request-Id` to every incoming request
/// 2. `Tracing` -- logs request/response with structured trace spans
/// 3. `RequestBodyLimit` -- rejects bodies above `body_limit_bytes` with 413
/// 4. `CORS` -- Cross-Origin Resource Sharing based on configured origins
/// 5. `PropagateRequestId` -- copies `X-Request-Id` from the request to the response
///
/// The limit sits outside CORS: `Cors` needs a `Default` response body from
/// its inner service, which the limit's response body does not provide.
///
/// Service-level middleware declared on endpoints runs inside the router,
/// after all of these.
#[must_use]
pub fn build_http_layers(config: &ServerConfig) -> HttpLayers {
    let x_request_id = HeaderName::from_static("x-request-id");

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(
            x_request_id.clone(),
            MakeRequestUuid,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
        .layer(build_cors_layer(&config.cors_origins))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}

/// A wildcard `"*"` allows any origin; otherwise only the parseable origins
/// listed are allowed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::HEAD,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    #[test]
    fn build_http_layers_does_not_panic_with_defaults() {
        let _layers = build_http_layers(&ServerConfig::default());
    }

    #[test]
    fn build_cors_layer_specific_origins() {
        let origins = vec![
            "http://localhost:3000".to_string(),
            "https://example.com".to_string(),
        ];
        let _cors = build_cors_layer(&origins);
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let router = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(build_http_layers(&ServerConfig::default()));

        let response = router
            .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let config = ServerConfig {
            body_limit_bytes: 4,
            ..ServerConfig::default()
        };
        let router = Router::new()
            .route("/upload", axum::routing::post(|body: String| async move { body }))
            .layer(build_http_layers(&config));

        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/upload")
                    .header("content-length", "11")
                    .body(Body::from("0123456789a"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn layers_wrap_a_host_router() {
        use std::sync::Arc;

        use async_trait::async_trait;
        use waymark_core::{Failure, HttpMethod};

        use crate::network::{AxumHost, ChainLink, HostRouter, Request as ChainRequest};
        use crate::network::{RequestHandler, ResponseWriter};

        struct Pong;

        #[async_trait]
        impl RequestHandler for Pong {
            async fn handle(
                &self,
                _req: &ChainRequest,
                res: &mut ResponseWriter,
            ) -> Result<(), Failure> {
                res.send("pong");
                Ok(())
            }
        }

        let config = ServerConfig {
            body_limit_bytes: 4,
            ..ServerConfig::default()
        };
        let mut host = AxumHost::new(config.body_limit_bytes);
        host.register(
            HttpMethod::Post,
            "/ping",
            vec![ChainLink::Handler(Arc::new(Pong))],
        );
        let router = host.into_router().layer(build_http_layers(&config));

        let small = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ping")
                    .header("origin", "http://localhost:3000")
                    .body(Body::from("ok"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(small.status(), StatusCode::OK);
        assert!(small.headers().contains_key("access-control-allow-origin"));

        let large = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/ping")
                    .header("content-length", "11")
                    .body(Body::from("0123456789a"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(large.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
