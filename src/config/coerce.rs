//! Best-effort coercion of environment strings.

use serde_json::{Number, Value};

/// Convert a raw environment value into the closest typed value.
///
/// - `true`/`false` (any case) become booleans
/// - integers that fit in `i64` become integers
/// - finite floats become floats
/// - anything else stays the raw string
///
/// A number is only produced when it renders back to the same text, so
/// "007", "+5", "1.10" and "1e3" stay strings. Lists are never split here.
pub fn coerce_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();

    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    canonical_number(trimmed).unwrap_or_else(|| Value::String(raw.to_string()))
}

fn canonical_number(s: &str) -> Option<Value> {
    if let Ok(int) = s.parse::<i64>() {
        return (int.to_string() == s).then(|| Value::from(int));
    }
    let number = s.parse::<f64>().ok().and_then(Number::from_f64)?;
    (number.to_string() == s).then_some(Value::Number(number))
}
