//! Classification of handler results.
//!
//! Every handler return type converts into a tagged [`Outcome`] through
//! [`IntoOutcome`]. The binding compiler settles deferred outcomes and writes
//! the rest into the response in one place ([`respond`]).

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use axum::Json;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use waymark_core::Failure;

use crate::network::{ByteStream, ResponseWriter};

type BoxedOutcomeFuture = Pin<Box<dyn Future<Output = Outcome> + Send>>;

/// The classified result of invoking a handler.
pub enum Outcome {
    /// Nothing to send: the response body is empty.
    Empty,
    /// Sent as text.
    Text(String),
    /// Sent as JSON.
    Value(Value),
    /// Raw bytes, sent as (lossy UTF-8) text.
    Bytes(Bytes),
    /// Piped to the response as chunks become available.
    Stream(ByteStream),
    /// A computation still running; its output is classified when it
    /// completes.
    Deferred(BoxedOutcomeFuture),
    /// The handler failed; the failure chain takes over.
    Failed(Failure),
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Empty => f.write_str("Empty"),
            Outcome::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Outcome::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Outcome::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            Outcome::Stream(stream) => f.debug_tuple("Stream").field(stream).finish(),
            Outcome::Deferred(_) => f.write_str("Deferred(..)"),
            Outcome::Failed(failure) => f.debug_tuple("Failed").field(failure).finish(),
        }
    }
}

/// Waits for deferred outcomes, then writes the result into the response.
///
/// # Errors
///
/// Returns the failure instead of writing anything when the outcome (or what
/// it deferred to) failed.
pub async fn respond(outcome: Outcome, res: &mut ResponseWriter) -> Result<(), Failure> {
    let mut outcome = outcome;
    loop {
        match outcome {
            Outcome::Deferred(future) => outcome = future.await,
            Outcome::Failed(failure) => return Err(failure),
            Outcome::Empty => break res.end(),
            Outcome::Text(text) => break res.send(text),
            Outcome::Value(value) => break res.json(value),
            Outcome::Bytes(bytes) => {
                break res.send(String::from_utf8_lossy(&bytes).into_owned());
            }
            Outcome::Stream(stream) => break res.pipe(stream),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// IntoOutcome
// ---------------------------------------------------------------------------

/// Converts a handler return value into an [`Outcome`].
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> Outcome {
        self
    }
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Outcome {
        Outcome::Empty
    }
}

impl<T: IntoOutcome> IntoOutcome for Option<T> {
    fn into_outcome(self) -> Outcome {
        self.map_or(Outcome::Empty, IntoOutcome::into_outcome)
    }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoOutcome,
    E: Into<Failure>,
{
    fn into_outcome(self) -> Outcome {
        match self {
            Ok(value) => value.into_outcome(),
            Err(err) => Outcome::Failed(err.into()),
        }
    }
}

impl IntoOutcome for String {
    fn into_outcome(self) -> Outcome {
        Outcome::Text(self)
    }
}

impl IntoOutcome for &'static str {
    fn into_outcome(self) -> Outcome {
        Outcome::Text(self.to_string())
    }
}

/// JSON strings are sent as text, `null` as an empty body.
impl IntoOutcome for Value {
    fn into_outcome(self) -> Outcome {
        match self {
            Value::Null => Outcome::Empty,
            Value::String(text) => Outcome::Text(text),
            other => Outcome::Value(other),
        }
    }
}

impl<T: Serialize> IntoOutcome for Json<T> {
    fn into_outcome(self) -> Outcome {
        match serde_json::to_value(self.0) {
            Ok(value) => Outcome::Value(value),
            Err(err) => Outcome::Failed(Failure::error(err)),
        }
    }
}

impl IntoOutcome for Bytes {
    fn into_outcome(self) -> Outcome {
        Outcome::Bytes(self)
    }
}

impl IntoOutcome for Vec<u8> {
    fn into_outcome(self) -> Outcome {
        Outcome::Bytes(Bytes::from(self))
    }
}

impl IntoOutcome for ByteStream {
    fn into_outcome(self) -> Outcome {
        Outcome::Stream(self)
    }
}

impl IntoOutcome for Failure {
    fn into_outcome(self) -> Outcome {
        Outcome::Failed(self)
    }
}

macro_rules! impl_into_outcome_json {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoOutcome for $ty {
                fn into_outcome(self) -> Outcome {
                    Outcome::Value(Value::from(self))
                }
            }
        )*
    };
}

impl_into_outcome_json!(bool, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);

// ---------------------------------------------------------------------------
// Deferred
// ---------------------------------------------------------------------------

/// A handler result that completes later.
///
/// The future must be `'static`: clone whatever service state it needs
/// before building it.
pub struct Deferred<F>(pub F);

/// Marks a future as a deferred handler result.
pub fn defer<F>(future: F) -> Deferred<F>
where
    F: Future + Send + 'static,
    F::Output: IntoOutcome,
{
    Deferred(future)
}

impl<F> IntoOutcome for Deferred<F>
where
    F: Future + Send + 'static,
    F::Output: IntoOutcome,
{
    fn into_outcome(self) -> Outcome {
        let future = self.0;
        Outcome::Deferred(Box::pin(async move { future.await.into_outcome() }))
    }
}
