//! Request body unwrapping.
//!
//! Body-parsing middleware always produces a JSON value, so a plain string
//! payload arrives wrapped as `{"message": "..."}`. An object whose only
//! property is `message` is therefore replaced by that property's value. This
//! cannot tell a wrapped scalar apart from a genuine one-field object; both
//! are unwrapped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Property name that marks a wrapped scalar body.
pub const MESSAGE_FIELD: &str = "message";

/// Decides which "empty" bodies are withheld from the handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPolicy {
    /// `false`, `0` and `""` are treated as absent, like `null`.
    #[default]
    DropFalsy,
    /// `false`, `0` and `""` are passed to the handler.
    KeepFalsy,
}

/// Replaces a single-`message` object by its value; everything else is
/// returned unchanged.
#[must_use]
pub fn unwrap_body(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.len() == 1 && map.contains_key(MESSAGE_FIELD) => {
            map.remove(MESSAGE_FIELD).unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Returns the value appended as the handler's trailing body argument, if any.
///
/// `None`, `null` and empty objects/arrays never produce an argument. Falsy
/// scalars are dropped or kept according to `policy`.
#[must_use]
pub fn effective_body(body: Option<Value>, policy: BodyPolicy) -> Option<Value> {
    let body = unwrap_body(body?);
    let empty = match &body {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        scalar => policy == BodyPolicy::DropFalsy && is_falsy_scalar(scalar),
    };
    (!empty).then_some(body)
}

fn is_falsy_scalar(value: &Value) -> bool {
    match value {
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => is_zero(n),
        _ => false,
    }
}

/// Exactly `0`, `0.0` or `-0.0`.
#[allow(clippy::float_cmp)]
fn is_zero(n: &serde_json::Number) -> bool {
    n.as_u64() == Some(0) || n.as_i64() == Some(0) || n.as_f64() == Some(0.0)
}
