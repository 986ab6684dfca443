//! Response writer shared by every link of a handler chain.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::Stream;
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde_json::Value;
use tracing::warn;

// ---------------------------------------------------------------------------
// ByteStream
// ---------------------------------------------------------------------------

/// A byte stream piped to the client chunk by chunk, never buffered whole.
pub struct ByteStream {
    inner: Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>,
}

impl ByteStream {
    /// Wraps any `Send` stream of byte chunks.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, io::Error>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// A stream over already available chunks.
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        I::IntoIter: Send + 'static,
        B: Into<Bytes>,
    {
        Self::new(futures_util::stream::iter(
            chunks.into_iter().map(|chunk| Ok(chunk.into())),
        ))
    }
}

impl Stream for ByteStream {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteStream").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ResponseBody
// ---------------------------------------------------------------------------

/// What has been sent so far.
#[derive(Debug, Default)]
pub enum ResponseBody {
    #[default]
    Empty,
    Text(String),
    Json(Value),
    Stream(ByteStream),
}

impl From<String> for ResponseBody {
    fn from(text: String) -> Self {
        ResponseBody::Text(text)
    }
}

impl From<&str> for ResponseBody {
    fn from(text: &str) -> Self {
        ResponseBody::Text(text.to_string())
    }
}

impl From<Value> for ResponseBody {
    fn from(value: Value) -> Self {
        ResponseBody::Json(value)
    }
}

impl From<ByteStream> for ResponseBody {
    fn from(stream: ByteStream) -> Self {
        ResponseBody::Stream(stream)
    }
}

// ---------------------------------------------------------------------------
// ResponseWriter
// ---------------------------------------------------------------------------

/// Mutable response handed to middleware, handlers, and error handlers.
///
/// The status code may be changed any number of times until the chain
/// finishes. The body can be sent once; later sends are ignored with a
/// warning.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
    sent: bool,
}

impl ResponseWriter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
            sent: false,
        }
    }

    /// Sets the status code.
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    #[must_use]
    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// Sends a body: text, JSON, or a stream.
    pub fn send(&mut self, body: impl Into<ResponseBody>) {
        if self.sent {
            warn!(status = %self.status, "response already sent; ignoring second send");
            return;
        }
        self.body = body.into();
        self.sent = true;
    }

    /// Sends a JSON value.
    pub fn json(&mut self, value: Value) {
        self.send(ResponseBody::Json(value));
    }

    /// Pipes a byte stream into the response.
    pub fn pipe(&mut self, stream: ByteStream) {
        self.send(ResponseBody::Stream(stream));
    }

    /// Finishes the response with an empty body.
    pub fn end(&mut self) {
        self.send(ResponseBody::Empty);
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoResponse for ResponseWriter {
    fn into_response(self) -> Response {
        let (content_type, body) = match self.body {
            ResponseBody::Empty => (None, Body::empty()),
            ResponseBody::Text(text) => (Some("text/plain; charset=utf-8"), Body::from(text)),
            ResponseBody::Json(value) => (Some("application/json"), Body::from(value.to_string())),
            ResponseBody::Stream(stream) => {
                (Some("application/octet-stream"), Body::from_stream(stream))
            }
        };

        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        if let Some(content_type) = content_type {
            response
                .headers_mut()
                .entry(header::CONTENT_TYPE)
                .or_insert(HeaderValue::from_static(content_type));
        }
        response
    }
}
