//! Positional arguments extracted from a request and their conversion into
//! handler parameter types.

use std::vec;

use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// One positional argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// A path, query, or header value. `None` when the request lacked it.
    Text(Option<String>),
    /// The unwrapped request body.
    Body(Value),
}

/// Arguments in binding order: path params, query params, headers, body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Vec<Arg>,
}

impl Args {
    #[must_use]
    pub fn new(values: Vec<Arg>) -> Self {
        Self { values }
    }

    pub fn push(&mut self, arg: Arg) {
        self.values.push(arg);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&Arg> {
        self.values.get(position)
    }
}

impl IntoIterator for Args {
    type Item = Arg;
    type IntoIter = vec::IntoIter<Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// Errors converting a positional argument into a parameter type.
#[derive(Debug, thiserror::Error)]
pub enum ArgumentError {
    #[error("argument {position} is missing")]
    Missing { position: usize },
    #[error("argument {position} could not be parsed from {value:?}: {reason}")]
    Invalid {
        position: usize,
        value: String,
        reason: String,
    },
    #[error("argument {position} has an unexpected shape: {source}")]
    Shape {
        position: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Converts one positional argument into a handler parameter.
///
/// `arg` is `None` when the handler declares more parameters than the request
/// supplied (for example an optional body that was not sent).
pub trait FromArg: Sized {
    /// # Errors
    ///
    /// Returns an [`ArgumentError`] when the value is required but missing,
    /// or cannot be converted.
    fn from_arg(arg: Option<Arg>, position: usize) -> Result<Self, ArgumentError>;
}

impl<T: FromArg> FromArg for Option<T> {
    fn from_arg(arg: Option<Arg>, position: usize) -> Result<Self, ArgumentError> {
        match arg {
            None | Some(Arg::Text(None)) => Ok(None),
            present => T::from_arg(present, position).map(Some),
        }
    }
}

/// Absent values become the empty string.
impl FromArg for String {
    fn from_arg(arg: Option<Arg>, _position: usize) -> Result<Self, ArgumentError> {
        Ok(match arg {
            None | Some(Arg::Text(None)) => String::new(),
            Some(Arg::Text(Some(text)) | Arg::Body(Value::String(text))) => text,
            Some(Arg::Body(value)) => value.to_string(),
        })
    }
}

/// Absent values become `null`; text values become JSON strings.
impl FromArg for Value {
    fn from_arg(arg: Option<Arg>, _position: usize) -> Result<Self, ArgumentError> {
        Ok(match arg {
            None | Some(Arg::Text(None)) => Value::Null,
            Some(Arg::Text(Some(text))) => Value::String(text),
            Some(Arg::Body(value)) => value,
        })
    }
}

impl<T: DeserializeOwned> FromArg for Json<T> {
    fn from_arg(arg: Option<Arg>, position: usize) -> Result<Self, ArgumentError> {
        let value = match arg {
            None | Some(Arg::Text(None)) => return Err(ArgumentError::Missing { position }),
            Some(Arg::Text(Some(text))) => Value::String(text),
            Some(Arg::Body(value)) => value,
        };
        serde_json::from_value(value)
            .map(Json)
            .map_err(|source| ArgumentError::Shape { position, source })
    }
}

macro_rules! impl_from_arg_parsed {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromArg for $ty {
                fn from_arg(arg: Option<Arg>, position: usize) -> Result<Self, ArgumentError> {
                    match arg {
                        None | Some(Arg::Text(None)) => Err(ArgumentError::Missing { position }),
                        Some(Arg::Text(Some(text))) => text.trim().parse().map_err(|err| {
                            ArgumentError::Invalid {
                                position,
                                value: text.clone(),
                                reason: format!("{err}"),
                            }
                        }),
                        Some(Arg::Body(value)) => serde_json::from_value(value)
                            .map_err(|source| ArgumentError::Shape { position, source }),
                    }
                }
            }
        )*
    };
}

impl_from_arg_parsed!(bool, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, f32, f64);
