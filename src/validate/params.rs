//! Validation of named parameter sets.

use serde_json::{Map, Value};
use tracing::debug;

use super::{render_value, TypeSpec};
use crate::args::Args;
use crate::config::MergedConfig;
use crate::error::{Error, Result, ValidationError};

/// Where a parameter's default comes from when the caller omits it.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamDefault {
    /// No default; the parameter's spec decides whether absence is valid
    None,
    /// Fixed value
    Value(Value),
    /// Configuration key, looked up on every call
    Config(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Param {
    name: String,
    spec: TypeSpec,
    default: ParamDefault,
}

/// Table of named, typed parameters applied in front of a function.
///
/// Missing or null parameters take their declared default. Defaults are
/// resolved on each call, so configuration-backed defaults reflect the
/// configuration handed to that call.
///
/// ```
/// use apputil::{Args, ParamTable, TypeSpec};
/// use serde_json::{json, Map};
///
/// let create = ParamTable::new()
///     .param("name", TypeSpec::non_empty_string())
///     .param_default("size", TypeSpec::positive_nonzero_integer(), 10);
///
/// let mut supplied = Map::new();
/// supplied.insert("name".into(), json!("vol1"));
/// let args: Args = create.apply(supplied, None).unwrap();
/// assert_eq!(args.get_i64("size"), Some(10));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamTable {
    params: Vec<Param>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter without a default.
    pub fn param(self, name: impl Into<String>, spec: TypeSpec) -> Self {
        self.with(name, spec, ParamDefault::None)
    }

    /// Declare a parameter with a fixed default.
    pub fn param_default(
        self,
        name: impl Into<String>,
        spec: TypeSpec,
        default: impl Into<Value>,
    ) -> Self {
        self.with(name, spec, ParamDefault::Value(default.into()))
    }

    /// Declare a parameter whose default is the configuration value `key`.
    pub fn param_from_config(
        self,
        name: impl Into<String>,
        spec: TypeSpec,
        key: impl Into<String>,
    ) -> Self {
        self.with(name, spec, ParamDefault::Config(key.into()))
    }

    fn with(mut self, name: impl Into<String>, spec: TypeSpec, default: ParamDefault) -> Self {
        self.params.push(Param {
            name: name.into(),
            spec,
            default,
        });
        self
    }

    /// Fill in defaults, validate every parameter, and reject unknown ones.
    ///
    /// All problems are collected into a single
    /// [`Error::InvalidArguments`].
    pub fn apply(
        &self,
        mut supplied: Map<String, Value>,
        config: Option<&MergedConfig>,
    ) -> Result<Args> {
        let mut validated = Map::new();
        let mut errors = Vec::new();

        for param in &self.params {
            let raw = match supplied.remove(&param.name) {
                Some(value) if !value.is_null() => value,
                _ => {
                    let default = resolve_default(&param.default, config);
                    debug!(
                        param = %param.name,
                        default = %render_value(&default),
                        "Using default value"
                    );
                    default
                }
            };

            debug!(param = %param.name, expected = %param.spec, "Validating parameter");
            match param.spec.validate_as(&param.name, &raw) {
                Ok(value) => {
                    validated.insert(param.name.clone(), value);
                }
                Err(err) => errors.push(err),
            }
        }

        for unknown in supplied.keys() {
            errors.push(ValidationError::new(
                unknown.as_str(),
                "no such parameter",
                "Unknown argument",
            ));
        }

        if errors.is_empty() {
            Ok(Args::from(validated))
        } else {
            Err(Error::InvalidArguments(errors))
        }
    }

    /// Wrap `f` so every call first runs through [`apply`](Self::apply).
    pub fn wrap<'a, F, R, E>(
        self,
        config: &'a MergedConfig,
        f: F,
    ) -> impl Fn(Map<String, Value>) -> std::result::Result<R, E> + 'a
    where
        F: Fn(&Args) -> std::result::Result<R, E> + 'a,
        R: 'a,
        E: From<Error> + 'a,
    {
        move |supplied| {
            let args = self.apply(supplied, Some(config))?;
            f(&args)
        }
    }
}

fn resolve_default(default: &ParamDefault, config: Option<&MergedConfig>) -> Value {
    match default {
        ParamDefault::None => Value::Null,
        ParamDefault::Value(value) => value.clone(),
        ParamDefault::Config(key) => config
            .and_then(|config| config.resolve(key).ok())
            .cloned()
            .unwrap_or(Value::Null),
    }
}

/// Validate the named entries of `args`, passing other entries through.
///
/// A validator whose argument is missing is an error. All problems are
/// collected into a single [`Error::InvalidArguments`].
pub fn validate_args(
    args: &Map<String, Value>,
    validators: &[(&str, TypeSpec)],
) -> Result<Map<String, Value>> {
    let mut validated = args.clone();
    let mut errors = Vec::new();

    for (name, spec) in validators {
        match args.get(*name) {
            None => errors.push(ValidationError::new(
                *name,
                spec.to_string(),
                format!("Missing argument '{name}'"),
            )),
            Some(raw) => match spec.validate_as(name, raw) {
                Ok(value) => {
                    validated.insert((*name).to_string(), value);
                }
                Err(err) => errors.push(err),
            },
        }
    }

    if errors.is_empty() {
        Ok(validated)
    } else {
        Err(Error::InvalidArguments(errors))
    }
}

/// Require at least one of `names` to hold a truthy value.
pub fn at_least_one_of(args: &Args, names: &[&str]) -> std::result::Result<(), ValidationError> {
    let any_set = names
        .iter()
        .any(|name| args.get(name).is_some_and(is_truthy));
    if any_set {
        Ok(())
    } else {
        Err(ValidationError::new(
            names.join(","),
            "at least one value",
            format!("At least one of [{}] must have a value", names.join(",")),
        ))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
