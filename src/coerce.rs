//! Numeric coercion of wire strings.
//!
//! Path segments, query values and headers arrive as strings. When the
//! top-level schema for such a value declares `type: number` or
//! `type: integer`, the string is converted to a JSON number before schema
//! evaluation so that numeric keywords see a number instead of a string.
//! Conversion failure is not an error here; the original string passes
//! through and the schema's `type` keyword reports it.

use serde_json::Value;

/// Whether a schema's top-level `type` mandates a numeric value.
pub(crate) fn schema_wants_number(schema: &Value) -> bool {
    matches!(
        schema.get("type").and_then(Value::as_str),
        Some("number") | Some("integer")
    )
}

/// Coerce a wire string to a number if the top-level schema asks for one.
///
/// Integers parse through `i64` then `u64`; values with a fraction or
/// exponent parse as `f64`. The ladder round-trips `int32`, `int64`,
/// `float` and `double` formats exactly, and keeps `1` distinct from `1.0`.
pub(crate) fn coerce_scalar(raw: &str, schema: &Value) -> Value {
    if !schema_wants_number(schema) {
        return Value::String(raw.to_string());
    }
    parse_number(raw).unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Coerce an already-decoded scalar when the top-level schema is numeric.
/// Non-string values are returned unchanged.
pub(crate) fn coerce_value(value: Value, schema: &Value) -> Value {
    match value {
        Value::String(s) if schema_wants_number(schema) => {
            parse_number(&s).unwrap_or(Value::String(s))
        }
        other => other,
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    let fractional = raw.contains(['.', 'e', 'E']);
    if !fractional {
        if let Ok(i) = raw.parse::<i64>() {
            return Some(Value::from(i));
        }
        if let Ok(u) = raw.parse::<u64>() {
            return Some(Value::from(u));
        }
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}
