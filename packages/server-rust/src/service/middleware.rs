//! Middleware and error-handler contracts attached to services and endpoints.
//!
//! - [`Middleware`]: runs before the synthesized request handler and decides
//!   whether the chain continues ([`Flow`])
//! - [`ErrorHandler`]: runs only after a failure and either resolves the
//!   response or forwards a (possibly different) failure ([`Recovery`])
//! - [`DefaultErrorHandler`]: terminal link of every registered chain

use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use tracing::error;
use waymark_core::Failure;

use crate::network::{Request, ResponseWriter};

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// What a middleware wants the chain to do next.
#[derive(Debug)]
pub enum Flow {
    /// Pass control to the next link.
    Continue,
    /// The middleware has finished the response; stop here.
    Halt,
    /// Abort normal processing and enter the failure chain.
    Fail(Failure),
}

/// A request-processing step invoked before the endpoint handler.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, req: &mut Request, res: &mut ResponseWriter) -> Flow;
}

/// Adapter turning a synchronous closure into a [`Middleware`].
pub struct FnMiddleware<F>(F);

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Request, &mut ResponseWriter) -> Flow + Send + Sync + 'static,
{
    async fn handle(&self, req: &mut Request, res: &mut ResponseWriter) -> Flow {
        (self.0)(req, res)
    }
}

/// Wraps a closure as a shareable middleware.
pub fn middleware_fn<F>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(&mut Request, &mut ResponseWriter) -> Flow + Send + Sync + 'static,
{
    Arc::new(FnMiddleware(f))
}

// ---------------------------------------------------------------------------
// ErrorHandler
// ---------------------------------------------------------------------------

/// What an error handler did with the failure it received.
#[derive(Debug)]
pub enum Recovery {
    /// The response is final; the rest of the failure chain is skipped.
    Resolved,
    /// Hand this failure to the next error handler.
    Forward(Failure),
}

/// A failure-processing step.
#[async_trait]
pub trait ErrorHandler: Send + Sync + 'static {
    async fn handle(&self, failure: Failure, req: &Request, res: &mut ResponseWriter) -> Recovery;
}

/// Adapter turning a synchronous closure into an [`ErrorHandler`].
pub struct FnErrorHandler<F>(F);

#[async_trait]
impl<F> ErrorHandler for FnErrorHandler<F>
where
    F: Fn(Failure, &Request, &mut ResponseWriter) -> Recovery + Send + Sync + 'static,
{
    async fn handle(&self, failure: Failure, req: &Request, res: &mut ResponseWriter) -> Recovery {
        (self.0)(failure, req, res)
    }
}

/// Wraps a closure as a shareable error handler.
pub fn error_handler_fn<F>(f: F) -> Arc<dyn ErrorHandler>
where
    F: Fn(Failure, &Request, &mut ResponseWriter) -> Recovery + Send + Sync + 'static,
{
    Arc::new(FnErrorHandler(f))
}

/// Terminal error handler: responds 500 with the failure's JSON envelope.
///
/// Any status set by earlier handlers is overwritten. If a body was already
/// sent, the failure is only logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

#[async_trait]
impl ErrorHandler for DefaultErrorHandler {
    async fn handle(&self, failure: Failure, req: &Request, res: &mut ResponseWriter) -> Recovery {
        let envelope = failure.envelope();
        error!(
            method = %req.method(),
            path = %req.path(),
            error = %envelope,
            "Request error"
        );
        if !res.is_sent() {
            res.status(StatusCode::INTERNAL_SERVER_ERROR).json(envelope);
        }
        Recovery::Resolved
    }
}

// ---------------------------------------------------------------------------
// Lists accepted by declarations
// ---------------------------------------------------------------------------

/// One middleware or an ordered list of them.
pub struct Middlewares(pub(crate) Vec<Arc<dyn Middleware>>);

impl<M: Middleware> From<M> for Middlewares {
    fn from(middleware: M) -> Self {
        Middlewares(vec![Arc::new(middleware)])
    }
}

impl From<Arc<dyn Middleware>> for Middlewares {
    fn from(middleware: Arc<dyn Middleware>) -> Self {
        Middlewares(vec![middleware])
    }
}

impl From<Vec<Arc<dyn Middleware>>> for Middlewares {
    fn from(list: Vec<Arc<dyn Middleware>>) -> Self {
        Middlewares(list)
    }
}

/// One error handler or an ordered list of them.
pub struct ErrorHandlers(pub(crate) Vec<Arc<dyn ErrorHandler>>);

impl<E: ErrorHandler> From<E> for ErrorHandlers {
    fn from(handler: E) -> Self {
        ErrorHandlers(vec![Arc::new(handler)])
    }
}

impl From<Arc<dyn ErrorHandler>> for ErrorHandlers {
    fn from(handler: Arc<dyn ErrorHandler>) -> Self {
        ErrorHandlers(vec![handler])
    }
}

impl From<Vec<Arc<dyn ErrorHandler>>> for ErrorHandlers {
    fn from(list: Vec<Arc<dyn ErrorHandler>>) -> Self {
        ErrorHandlers(list)
    }
}
