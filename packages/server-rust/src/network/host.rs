//! The narrow interface between compiled services and an HTTP host.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use waymark_core::{Failure, HttpMethod};

use super::request::Request;
use super::response::ResponseWriter;
use crate::service::middleware::{ErrorHandler, Middleware};

/// The final request-processing step of a chain.
///
/// Returning `Ok` means the response is complete; `Err` hands the failure to
/// the error handlers that follow in the chain.
#[async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    async fn handle(&self, req: &Request, res: &mut ResponseWriter) -> Result<(), Failure>;
}

/// One element of a registered chain.
#[derive(Clone)]
pub enum ChainLink {
    Middleware(Arc<dyn Middleware>),
    Handler(Arc<dyn RequestHandler>),
    ErrorHandler(Arc<dyn ErrorHandler>),
}

impl fmt::Debug for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChainLink::Middleware(_) => "Middleware",
            ChainLink::Handler(_) => "Handler",
            ChainLink::ErrorHandler(_) => "ErrorHandler",
        })
    }
}

/// A router that accepts `(method, route, chain)` registrations.
///
/// Routes use `:name` segments for path parameters. Implementations decide
/// how overlapping registrations are matched; the bundled
/// [`AxumHost`](super::axum_host::AxumHost) keeps the first registration of a
/// duplicate `(method, route)`.
pub trait HostRouter {
    fn register(&mut self, method: HttpMethod, route: &str, chain: Vec<ChainLink>);
}

/// A host that only records registrations. Used to inspect compiled chains.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub registrations: Vec<(HttpMethod, String, Vec<ChainLink>)>,
}

impl RecordingHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the chain registered for `method` and `route`.
    #[must_use]
    pub fn chain(&self, method: HttpMethod, route: &str) -> Option<&[ChainLink]> {
        self.registrations
            .iter()
            .find(|(m, r, _)| *m == method && r == route)
            .map(|(_, _, chain)| chain.as_slice())
    }

    /// `(method, route)` pairs in registration order.
    #[must_use]
    pub fn routes(&self) -> Vec<(HttpMethod, &str)> {
        self.registrations
            .iter()
            .map(|(m, r, _)| (*m, r.as_str()))
            .collect()
    }
}

impl HostRouter for RecordingHost {
    fn register(&mut self, method: HttpMethod, route: &str, chain: Vec<ChainLink>) {
        self.registrations.push((method, route.to_string(), chain));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::middleware::{middleware_fn, DefaultErrorHandler, Flow};

    #[test]
    fn recording_host_keeps_order() {
        let mut host = RecordingHost::new();
        host.register(HttpMethod::Get, "/a", vec![]);
        host.register(
            HttpMethod::Post,
            "/b",
            vec![
                ChainLink::Middleware(middleware_fn(|_, _| Flow::Continue)),
                ChainLink::ErrorHandler(Arc::new(DefaultErrorHandler)),
            ],
        );

        assert_eq!(
            host.routes(),
            vec![(HttpMethod::Get, "/a"), (HttpMethod::Post, "/b")]
        );
        assert_eq!(host.chain(HttpMethod::Post, "/b").unwrap().len(), 2);
        assert!(host.chain(HttpMethod::Get, "/b").is_none());
    }

    #[test]
    fn links_debug_by_kind() {
        let link = ChainLink::ErrorHandler(Arc::new(DefaultErrorHandler));
        assert_eq!(format!("{link:?}"), "ErrorHandler");
    }
}
