//! Type validation for argument values and function parameters.
//!
//! [`TypeSpec`] is a closed set of value shapes, each with its own coercion
//! rule. [`ParamTable`] applies a set of specs in front of a function.

mod net;
mod params;
mod spec;

use serde_json::Value;

pub use params::{at_least_one_of, validate_args, ParamDefault, ParamTable};
pub use spec::{StrSpec, TypeSpec};

use crate::error::ValidationError;

/// Validate `raw` against `spec`, returning the coerced value.
pub fn validate(raw: &Value, spec: &TypeSpec) -> Result<Value, ValidationError> {
    spec.validate(raw)
}

/// Render a value for humans: strings bare, lists comma-separated.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "none".to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(render_value).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!("Hello")), "Hello");
        assert_eq!(render_value(&json!(30)), "30");
        assert_eq!(render_value(&json!(["a", 1])), "a,1");
        assert_eq!(render_value(&Value::Null), "none");
        assert_eq!(render_value(&json!(true)), "true");
    }

    #[test]
    fn test_validate_free_function() {
        let spec = TypeSpec::optional(TypeSpec::integer());
        assert_eq!(validate(&Value::Null, &spec).unwrap(), Value::Null);
        assert_eq!(validate(&json!("8"), &spec).unwrap(), json!(8));
    }
}
