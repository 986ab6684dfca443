//! Binding compiler: turns a service's declarations into host registrations.
//!
//! For every endpoint, in declaration order, the compiler registers
//! `(method, base_route + route, chain)` where the chain is
//!
//! 1. class middleware, then endpoint middleware
//! 2. the synthesized [`EndpointHandler`]
//! 3. class error handlers, then endpoint error handlers
//! 4. [`DefaultErrorHandler`]

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{debug, error, info, warn};
use waymark_core::{effective_body, join_routes, BodyPolicy, EndpointDeclaration, Failure};

use super::args::{Arg, Args};
use super::handler::HandlerRef;
use super::middleware::DefaultErrorHandler;
use super::outcome::respond;
use super::registry::ServiceConfiguration;
use crate::network::{ChainLink, HostRouter, Request, RequestHandler, ResponseWriter};

/// Request handler synthesized for one endpoint of one service instance.
pub struct EndpointHandler<S> {
    service: Arc<S>,
    declaration: EndpointDeclaration,
    handler: HandlerRef<S>,
    body_policy: BodyPolicy,
}

impl<S> EndpointHandler<S> {
    #[must_use]
    pub fn new(
        service: Arc<S>,
        declaration: EndpointDeclaration,
        handler: HandlerRef<S>,
        body_policy: BodyPolicy,
    ) -> Self {
        Self {
            service,
            declaration,
            handler,
            body_policy,
        }
    }

    /// Extracts positional arguments: path params, query params, headers,
    /// then the body if it survives unwrapping.
    fn bind(&self, req: &Request) -> Args {
        let decl = &self.declaration;
        let mut args = Args::default();
        for name in &decl.path_param_names {
            args.push(Arg::Text(req.param(name).map(str::to_string)));
        }
        for name in &decl.query_param_names {
            args.push(Arg::Text(req.query(name).map(str::to_string)));
        }
        for name in &decl.header_names {
            args.push(Arg::Text(req.header(name).map(str::to_string)));
        }
        if let Some(body) = effective_body(req.body().cloned(), self.body_policy) {
            args.push(Arg::Body(body));
        }
        args
    }
}

#[async_trait]
impl<S: Send + Sync + 'static> RequestHandler for EndpointHandler<S> {
    async fn handle(&self, req: &Request, res: &mut ResponseWriter) -> Result<(), Failure> {
        let args = self.bind(req);
        debug!(
            handler = %self.declaration.handler_name,
            method = %req.method(),
            path = %req.path(),
            args = args.len(),
            "Dispatching request"
        );
        let invocation = async {
            let outcome = self.handler.call(&self.service, args);
            respond(outcome, res).await
        };
        match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    handler = %self.declaration.handler_name,
                    panic = %message,
                    "Handler panicked"
                );
                Err(Failure::Message(message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Registers every endpoint of `config`, bound to `service`, with `host`.
///
/// Returns the number of registrations made.
pub fn compile<S>(
    service: &Arc<S>,
    config: &ServiceConfiguration<S>,
    body_policy: BodyPolicy,
    host: &mut dyn HostRouter,
) -> usize
where
    S: Send + Sync + 'static,
{
    let service_name = std::any::type_name::<S>();
    let mut registered = 0;

    for endpoint in config.endpoints() {
        let decl = &endpoint.declaration;
        let name = decl.handler_name.as_str();
        let route = join_routes(config.base_route(), &decl.route_pattern);

        if decl.path_param_names.iter().any(String::is_empty) {
            warn!(
                service = service_name,
                handler = name,
                route = %route,
                "Route contains a path parameter with an empty name"
            );
        }

        let mut chain = Vec::new();
        chain.extend(
            config
                .class_middleware()
                .iter()
                .chain(config.endpoint_middleware(name))
                .cloned()
                .map(ChainLink::Middleware),
        );
        chain.push(ChainLink::Handler(Arc::new(EndpointHandler::new(
            Arc::clone(service),
            decl.clone(),
            endpoint.handler.clone(),
            body_policy,
        ))));
        chain.extend(
            config
                .class_error_handlers()
                .iter()
                .chain(config.endpoint_error_handlers(name))
                .cloned()
                .map(ChainLink::ErrorHandler),
        );
        chain.push(ChainLink::ErrorHandler(Arc::new(DefaultErrorHandler)));

        info!(
            service = service_name,
            handler = name,
            method = %decl.http_method,
            route = %route,
            links = chain.len(),
            "Registering endpoint"
        );
        host.register(decl.http_method, &route, chain);
        registered += 1;
    }

    registered
}
