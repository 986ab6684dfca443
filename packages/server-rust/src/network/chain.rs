//! Executes a registered chain against one request.
//!
//! A chain runs in one of two modes. In normal mode middleware and the
//! request handler run in order and error handlers are skipped. The first
//! failure switches to failure mode, where only error handlers run, each
//! either resolving the response or forwarding a failure to the next one.

use http::StatusCode;
use tracing::debug;
use waymark_core::Failure;

use super::host::ChainLink;
use super::request::Request;
use super::response::ResponseWriter;
use crate::service::middleware::{DefaultErrorHandler, ErrorHandler, Flow, Recovery};

/// Runs `chain` for `req` and returns the finished response.
///
/// A chain that ends in normal mode without a response yields 404. A failure
/// that is still unresolved at the end of the chain gets the default 500
/// envelope.
pub async fn run(chain: &[ChainLink], req: &mut Request) -> ResponseWriter {
    let mut res = ResponseWriter::new();
    let mut failure: Option<Failure> = None;

    for link in chain {
        match (link, failure.take()) {
            (ChainLink::Middleware(middleware), None) => {
                match middleware.handle(req, &mut res).await {
                    Flow::Continue => {}
                    Flow::Halt => return res,
                    Flow::Fail(err) => failure = Some(err),
                }
            }
            (ChainLink::Handler(handler), None) => match handler.handle(req, &mut res).await {
                Ok(()) => return res,
                Err(err) => failure = Some(err),
            },
            (ChainLink::ErrorHandler(_), None) => {}
            (ChainLink::ErrorHandler(handler), Some(err)) => {
                match handler.handle(err, req, &mut res).await {
                    Recovery::Resolved => return res,
                    Recovery::Forward(next) => failure = Some(next),
                }
            }
            (_, pending @ Some(_)) => failure = pending,
        }
    }

    match failure {
        Some(err) => {
            DefaultErrorHandler.handle(err, req, &mut res).await;
        }
        None => {
            debug!(method = %req.method(), path = %req.path(), "chain finished without a response");
            if !res.is_sent() {
                res.status(StatusCode::NOT_FOUND).end();
            }
        }
    }
    res
}
