//! Failure values carried through the error-handling chain.

use std::fmt;

use serde_json::{json, Value};

/// A failure raised by a handler, a middleware, or forwarded by an error
/// handler.
///
/// Error handlers may replace the failure with another one before passing
/// it on, so any of the variants can reach the terminal handler.
#[derive(Debug)]
pub enum Failure {
    /// An error value (typically from a handler returning `Err`).
    Error(anyhow::Error),
    /// A plain text failure.
    Message(String),
    /// An arbitrary JSON value. Plain objects are sent unchanged by the
    /// terminal handler.
    Value(Value),
}

impl Failure {
    /// Wraps any error convertible into `anyhow::Error`.
    pub fn error(err: impl Into<anyhow::Error>) -> Self {
        Failure::Error(err.into())
    }

    /// The body sent by the terminal handler: plain JSON objects as-is,
    /// everything else as `{"message": <text>}`.
    #[must_use]
    pub fn envelope(&self) -> Value {
        match self {
            Failure::Value(value @ Value::Object(_)) => value.clone(),
            other => json!({ "message": other.to_string() }),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Error(err) => write!(f, "{err}"),
            Failure::Message(msg) => f.write_str(msg),
            Failure::Value(Value::String(s)) => f.write_str(s),
            Failure::Value(value) => write!(f, "{value}"),
        }
    }
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        Failure::Error(err)
    }
}

impl From<String> for Failure {
    fn from(msg: String) -> Self {
        Failure::Message(msg)
    }
}

impl From<&str> for Failure {
    fn from(msg: &str) -> Self {
        Failure::Message(msg.to_string())
    }
}

impl From<Value> for Failure {
    fn from(value: Value) -> Self {
        Failure::Value(value)
    }
}

impl From<std::convert::Infallible> for Failure {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}
