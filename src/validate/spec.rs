//! Declarative value types and their coercion rules.

use std::fmt;

use regex::Regex;
use serde_json::{Number, Value};

use super::{net, render_value};
use crate::error::ValidationError;

/// Constraints shared by the string-shaped types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrSpec {
    pub allow_empty: bool,
    /// Characters that may not appear
    pub invalid_chars: Option<String>,
    /// When set, the only characters that may appear
    pub allowed_chars: Option<String>,
    /// Maximum length in characters
    pub max_len: Option<usize>,
}

impl StrSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    pub fn invalid_chars(mut self, chars: impl Into<String>) -> Self {
        self.invalid_chars = Some(chars.into());
        self
    }

    pub fn allowed_chars(mut self, chars: impl Into<String>) -> Self {
        self.allowed_chars = Some(chars.into());
        self
    }

    pub fn max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    fn check(&self, raw: &Value) -> Result<String, String> {
        let s = match raw {
            Value::Null => return Err("Argument must have a value".to_string()),
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(format!("{raw} is not a string"));
            }
        };

        if s.is_empty() && !self.allow_empty {
            return Err("Argument must have a value".to_string());
        }
        if let Some(invalid) = &self.invalid_chars {
            if s.chars().any(|c| invalid.contains(c)) {
                return Err("Argument contains invalid character".to_string());
            }
        }
        if let Some(allowed) = &self.allowed_chars {
            if s.chars().any(|c| !allowed.contains(c)) {
                return Err("Argument contains invalid character".to_string());
            }
        }
        if let Some(max_len) = self.max_len {
            if s.chars().count() > max_len {
                return Err(format!("{s} is longer than the maximum {max_len} characters"));
            }
        }
        Ok(s)
    }
}

/// Declarative description of an accepted value and how to coerce it.
///
/// Specs are stateless and can be reused across any number of calls.
/// Null is the "absent" sentinel: only [`TypeSpec::Optional`] and a
/// [`TypeSpec::List`] (as an empty list) accept it.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    /// Any value that is not null or an empty string
    Any,
    /// String, with scalars stringified
    Str(StrSpec),
    /// String that must not parse as a number
    NonNumericStr(StrSpec),
    /// Integer within an inclusive range
    Integer { min: Option<i64>, max: Option<i64> },
    /// Float within an inclusive range
    Float { min: Option<f64>, max: Option<f64> },
    /// Boolean, from bools or t/true/1 and f/false/0
    Bool,
    /// One of an enumerated set, after validating with `item`
    Selection { choices: Vec<Value>, item: Box<TypeSpec> },
    /// List of items split from strings on commas and whitespace
    List {
        item: Box<TypeSpec>,
        allow_empty: bool,
        min_len: usize,
        max_len: usize,
    },
    /// Absent passes through; present values are checked by the inner spec
    Optional(Option<Box<TypeSpec>>),
    /// First alternative that accepts the value
    Multi(Vec<TypeSpec>),
    Ipv4Address,
    Ipv4Subnet,
    Hostname,
    /// Hostname that resolves through the system resolver
    ResolvableHostname,
    MacAddress,
    /// Pattern that compiles as a regular expression
    Regex,
}

impl TypeSpec {
    /// Non-empty string.
    pub fn non_empty_string() -> Self {
        TypeSpec::Str(StrSpec::new())
    }

    pub fn string(spec: StrSpec) -> Self {
        TypeSpec::Str(spec)
    }

    pub fn non_numeric_string() -> Self {
        TypeSpec::NonNumericStr(StrSpec::new())
    }

    pub fn integer() -> Self {
        TypeSpec::Integer {
            min: None,
            max: None,
        }
    }

    pub fn integer_range(min: Option<i64>, max: Option<i64>) -> Self {
        TypeSpec::Integer { min, max }
    }

    /// Count of something; zero only when `allow_zero`.
    pub fn count(allow_zero: bool) -> Self {
        Self::integer_range(Some(if allow_zero { 0 } else { 1 }), None)
    }

    pub fn positive_integer() -> Self {
        Self::integer_range(Some(0), None)
    }

    pub fn positive_nonzero_integer() -> Self {
        Self::integer_range(Some(1), None)
    }

    pub fn vlan_tag() -> Self {
        Self::integer_range(Some(1), Some(4095))
    }

    pub fn float() -> Self {
        TypeSpec::Float {
            min: None,
            max: None,
        }
    }

    pub fn float_range(min: Option<f64>, max: Option<f64>) -> Self {
        TypeSpec::Float { min, max }
    }

    pub fn boolean() -> Self {
        TypeSpec::Bool
    }

    /// Choice among string values.
    pub fn selection<I, V>(choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::selection_of(choices, Self::non_empty_string())
    }

    /// Choice among values of the given item type.
    pub fn selection_of<I, V>(choices: I, item: TypeSpec) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        TypeSpec::Selection {
            choices: choices.into_iter().map(Into::into).collect(),
            item: Box::new(item),
        }
    }

    /// Non-empty list of `item`.
    pub fn list(item: TypeSpec) -> Self {
        Self::list_bounded(item, false, 0, usize::MAX)
    }

    pub fn list_bounded(item: TypeSpec, allow_empty: bool, min_len: usize, max_len: usize) -> Self {
        TypeSpec::List {
            item: Box::new(item),
            allow_empty,
            min_len,
            max_len,
        }
    }

    pub fn optional(inner: TypeSpec) -> Self {
        TypeSpec::Optional(Some(Box::new(inner)))
    }

    /// Optional value of any shape.
    pub fn optional_any() -> Self {
        TypeSpec::Optional(None)
    }

    pub fn one_of(alternatives: Vec<TypeSpec>) -> Self {
        TypeSpec::Multi(alternatives)
    }

    /// IPv4 address or a hostname that resolves.
    pub fn ipv4_address_or_hostname() -> Self {
        TypeSpec::Multi(vec![TypeSpec::Ipv4Address, TypeSpec::ResolvableHostname])
    }

    /// Whether an absent value is acceptable.
    pub fn is_optional(&self) -> bool {
        matches!(self, TypeSpec::Optional(_))
    }

    /// Validate and coerce `raw`.
    pub fn validate(&self, raw: &Value) -> Result<Value, ValidationError> {
        self.validate_as("argument", raw)
    }

    /// Validate and coerce `raw`, naming `key` in any error.
    pub fn validate_as(&self, key: &str, raw: &Value) -> Result<Value, ValidationError> {
        self.check(raw)
            .map_err(|reason| ValidationError::new(key, self.to_string(), reason))
    }

    fn check(&self, raw: &Value) -> Result<Value, String> {
        match self {
            TypeSpec::Any => match raw {
                Value::Null => Err("Argument must have a value".to_string()),
                Value::String(s) if s.is_empty() => Err("Argument must have a value".to_string()),
                other => Ok(other.clone()),
            },
            TypeSpec::Str(spec) => spec.check(raw).map(Value::String),
            TypeSpec::NonNumericStr(spec) => {
                let s = spec.check(raw)?;
                let trimmed = s.trim();
                if trimmed.parse::<i64>().is_ok() || trimmed.parse::<f64>().is_ok() {
                    return Err(format!("{s} cannot be a number"));
                }
                Ok(Value::String(s))
            }
            TypeSpec::Integer { min, max } => {
                let number = parse_integer(raw)
                    .ok_or_else(|| format!("{} is not a valid integer", render_value(raw)))?;
                if let Some(min) = min.filter(|min| number < *min) {
                    return Err(format!("{number} must be >= {min}"));
                }
                if let Some(max) = max.filter(|max| number > *max) {
                    return Err(format!("{number} must be <= {max}"));
                }
                Ok(Value::from(number))
            }
            TypeSpec::Float { min, max } => {
                let number = parse_float(raw)
                    .ok_or_else(|| format!("{} is not a valid number", render_value(raw)))?;
                if let Some(min) = min.filter(|min| number < *min) {
                    return Err(format!("{number} must be >= {min}"));
                }
                if let Some(max) = max.filter(|max| number > *max) {
                    return Err(format!("{number} must be <= {max}"));
                }
                Number::from_f64(number)
                    .map(Value::Number)
                    .ok_or_else(|| format!("{number} is not a valid number"))
            }
            TypeSpec::Bool => parse_bool(raw)
                .map(Value::Bool)
                .ok_or_else(|| "Invalid boolean value".to_string()),
            TypeSpec::Selection { choices, item } => {
                let selected = item
                    .check(raw)
                    .map_err(|_| format!("'{}' is not a valid {item}", render_value(raw)))?;
                if choices.contains(&selected) {
                    Ok(selected)
                } else {
                    Err(format!("'{}' is not a valid choice", render_value(raw)))
                }
            }
            TypeSpec::List {
                item,
                allow_empty,
                min_len,
                max_len,
            } => {
                let items = split_list(raw)
                    .into_iter()
                    .map(|value| {
                        item.check(&value)
                            .map_err(|reason| format!("Invalid {item} value: {reason}"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if !allow_empty && items.is_empty() {
                    return Err("list cannot be empty".to_string());
                }
                if items.len() < *min_len {
                    return Err(format!("list must be at least {min_len} elements"));
                }
                if items.len() > *max_len {
                    return Err(format!("list must be no more than {max_len} elements"));
                }
                Ok(Value::Array(items))
            }
            TypeSpec::Optional(inner) => match (raw, inner) {
                (Value::Null, _) => Ok(Value::Null),
                (_, None) => Ok(raw.clone()),
                (_, Some(inner)) => inner.check(raw),
            },
            TypeSpec::Multi(alternatives) => {
                let mut errors = Vec::with_capacity(alternatives.len());
                for alternative in alternatives {
                    match alternative.check(raw) {
                        Ok(value) => return Ok(value),
                        Err(reason) => errors.push(format!("{alternative}: {reason}")),
                    }
                }
                Err(format!(
                    "{} could not be parsed into an allowed type - {}",
                    render_value(raw),
                    errors.join(", ")
                ))
            }
            TypeSpec::Ipv4Address => {
                let s = StrSpec::new().check(raw)?;
                net::ipv4_address(&s).map(Value::String)
            }
            TypeSpec::Ipv4Subnet => {
                let s = StrSpec::new().check(raw)?;
                net::ipv4_subnet(&s).map(Value::String)
            }
            TypeSpec::Hostname => {
                let s = StrSpec::new().check(raw)?;
                net::hostname(&s).map(Value::String)
            }
            TypeSpec::ResolvableHostname => {
                let s = StrSpec::new().check(raw)?;
                net::resolvable_hostname(&s).map(Value::String)
            }
            TypeSpec::MacAddress => {
                let s = StrSpec::new().check(raw)?;
                net::mac_address(&s).map(Value::String)
            }
            TypeSpec::Regex => {
                let s = StrSpec::new().check(raw)?;
                Regex::new(&s)
                    .map(|_| Value::String(s))
                    .map_err(|_| "Invalid regex".to_string())
            }
        }
    }
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Any => f.write_str("any"),
            TypeSpec::Str(_) => f.write_str("str"),
            TypeSpec::NonNumericStr(_) => f.write_str("non-numeric str"),
            TypeSpec::Integer { .. } => f.write_str("int"),
            TypeSpec::Float { .. } => f.write_str("float"),
            TypeSpec::Bool => f.write_str("bool"),
            TypeSpec::Selection { choices, .. } => {
                let choices: Vec<String> = choices.iter().map(render_value).collect();
                write!(f, "one of [{}]", choices.join(","))
            }
            TypeSpec::List { item, .. } => write!(f, "list({item})"),
            TypeSpec::Optional(Some(inner)) => write!(f, "optional({inner})"),
            TypeSpec::Optional(None) => f.write_str("optional(any)"),
            TypeSpec::Multi(alternatives) => {
                let names: Vec<String> = alternatives.iter().map(ToString::to_string).collect();
                write!(f, "any of ({})", names.join(", "))
            }
            TypeSpec::Ipv4Address => f.write_str("IPv4Address"),
            TypeSpec::Ipv4Subnet => f.write_str("IPv4Subnet"),
            TypeSpec::Hostname => f.write_str("Hostname"),
            TypeSpec::ResolvableHostname => f.write_str("ResolvableHostname"),
            TypeSpec::MacAddress => f.write_str("MACAddress"),
            TypeSpec::Regex => f.write_str("RegEx"),
        }
    }
}

fn parse_integer(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_float(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|f| f.is_finite())
}

fn parse_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.to_lowercase().as_str() {
            "t" | "true" | "1" => Some(true),
            "f" | "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn split_list(raw: &Value) -> Vec<Value> {
    match raw {
        Value::Null => Vec::new(),
        Value::String(s) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|piece| !piece.is_empty())
            .map(|piece| Value::String(piece.to_string()))
            .collect(),
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_empty_string() {
        let spec = TypeSpec::non_empty_string();
        assert_eq!(spec.validate(&json!("abc")).unwrap(), json!("abc"));
        assert_eq!(spec.validate(&json!(12)).unwrap(), json!("12"));
        assert!(spec.validate(&json!("")).is_err());
        assert!(spec.validate(&Value::Null).is_err());
        assert!(spec.validate(&json!(["a"])).is_err());
    }

    #[test]
    fn test_string_constraints() {
        let spec = TypeSpec::string(StrSpec::new().invalid_chars("/\\").max_len(5));
        assert!(spec.validate(&json!("ok")).is_ok());
        assert!(spec.validate(&json!("a/b")).is_err());
        assert!(spec.validate(&json!("toolong")).is_err());

        let spec = TypeSpec::string(StrSpec::new().allowed_chars("abc").allow_empty());
        assert_eq!(spec.validate(&json!("")).unwrap(), json!(""));
        assert!(spec.validate(&json!("abd")).is_err());
    }

    #[test]
    fn test_non_numeric_string() {
        let spec = TypeSpec::non_numeric_string();
        assert!(spec.validate(&json!("volume1")).is_ok());
        assert!(spec.validate(&json!("42")).is_err());
        assert!(spec.validate(&json!("4.2")).is_err());
    }

    #[test]
    fn test_integer_coercion_and_bounds() {
        let spec = TypeSpec::integer_range(Some(1), Some(10));
        assert_eq!(spec.validate(&json!("7")).unwrap(), json!(7));
        assert_eq!(spec.validate(&json!(3)).unwrap(), json!(3));
        assert_eq!(spec.validate(&json!(4.0)).unwrap(), json!(4));
        assert!(spec.validate(&json!(4.5)).is_err());
        assert!(spec.validate(&json!("abc")).is_err());
        assert!(spec.validate(&json!(true)).is_err());

        let err = spec.validate_as("count", &json!(0)).unwrap_err();
        assert_eq!(err.key, "count");
        assert_eq!(err.expected, "int");
        assert_eq!(err.reason, "0 must be >= 1");
        assert_eq!(
            spec.validate(&json!(11)).unwrap_err().reason,
            "11 must be <= 10"
        );
    }

    #[test]
    fn test_integer_shorthands() {
        assert!(TypeSpec::count(false).validate(&json!(0)).is_err());
        assert!(TypeSpec::count(true).validate(&json!(0)).is_ok());
        assert!(TypeSpec::positive_integer().validate(&json!(-1)).is_err());
        assert!(TypeSpec::positive_nonzero_integer()
            .validate(&json!(0))
            .is_err());
        assert!(TypeSpec::vlan_tag().validate(&json!(4095)).is_ok());
        assert!(TypeSpec::vlan_tag().validate(&json!(4096)).is_err());
    }

    #[test]
    fn test_float() {
        let spec = TypeSpec::float_range(Some(0.0), Some(1.0));
        assert_eq!(spec.validate(&json!("0.25")).unwrap(), json!(0.25));
        assert_eq!(spec.validate(&json!(1)).unwrap(), json!(1.0));
        assert!(spec.validate(&json!(1.5)).is_err());
        assert!(spec.validate(&json!("nan")).is_err());
    }

    #[test]
    fn test_bool() {
        let spec = TypeSpec::boolean();
        for raw in [json!(true), json!("T"), json!("true"), json!("1"), json!(1)] {
            assert_eq!(spec.validate(&raw).unwrap(), json!(true), "{raw}");
        }
        for raw in [json!(false), json!("f"), json!("FALSE"), json!("0"), json!(0)] {
            assert_eq!(spec.validate(&raw).unwrap(), json!(false), "{raw}");
        }
        assert!(spec.validate(&json!("maybe")).is_err());
        assert!(spec.validate(&Value::Null).is_err());
    }

    #[test]
    fn test_selection() {
        let spec = TypeSpec::selection(["plain", "shout"]);
        assert_eq!(spec.validate(&json!("shout")).unwrap(), json!("shout"));
        let err = spec.validate(&json!("whisper")).unwrap_err();
        assert_eq!(err.reason, "'whisper' is not a valid choice");
        assert_eq!(err.expected, "one of [plain,shout]");

        let spec = TypeSpec::selection_of([1, 2, 3], TypeSpec::integer());
        assert_eq!(spec.validate(&json!("2")).unwrap(), json!(2));
        assert!(spec.validate(&json!("x")).is_err());
    }

    #[test]
    fn test_list_splitting() {
        let spec = TypeSpec::list(TypeSpec::non_empty_string());
        assert_eq!(
            spec.validate(&json!("a, b  c,,d")).unwrap(),
            json!(["a", "b", "c", "d"])
        );
        assert_eq!(spec.validate(&json!(["x"])).unwrap(), json!(["x"]));
        assert_eq!(spec.validate(&json!(5)).unwrap(), json!(["5"]));
        assert_eq!(
            spec.validate(&json!("")).unwrap_err().reason,
            "list cannot be empty"
        );

        let ints = TypeSpec::list(TypeSpec::integer());
        assert_eq!(ints.validate(&json!("1,2,3")).unwrap(), json!([1, 2, 3]));
        assert!(ints.validate(&json!("1,x")).is_err());
        assert_eq!(ints.to_string(), "list(int)");
    }

    #[test]
    fn test_list_length_bounds() {
        let spec = TypeSpec::list_bounded(TypeSpec::integer(), true, 0, 2);
        assert_eq!(spec.validate(&Value::Null).unwrap(), json!([]));
        assert!(spec.validate(&json!("1 2 3")).is_err());

        let spec = TypeSpec::list_bounded(TypeSpec::integer(), false, 2, usize::MAX);
        assert!(spec.validate(&json!("1")).is_err());
        assert!(spec.validate(&json!("1 2")).is_ok());
    }

    #[test]
    fn test_optional_passes_absent_through() {
        let spec = TypeSpec::optional(TypeSpec::integer());
        assert_eq!(spec.validate(&Value::Null).unwrap(), Value::Null);
        assert_eq!(spec.validate(&json!("5")).unwrap(), json!(5));
        assert!(spec.validate(&json!("five")).is_err());
        assert_eq!(spec.to_string(), "optional(int)");
    }

    #[test]
    fn test_optional_is_idempotent() {
        let spec = TypeSpec::optional(TypeSpec::list(TypeSpec::integer()));
        for raw in [Value::Null, json!("1, 2"), json!([3])] {
            let once = spec.validate(&raw).unwrap();
            let twice = spec.validate(&once).unwrap();
            assert_eq!(once, twice);
        }
        let any = TypeSpec::optional_any();
        assert_eq!(any.validate(&json!({"a": 1})).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_multi_reports_every_alternative() {
        let spec = TypeSpec::ipv4_address_or_hostname();
        assert_eq!(spec.validate(&json!("10.0.0.1")).unwrap(), json!("10.0.0.1"));
        assert_eq!(spec.validate(&json!("localhost")).unwrap(), json!("localhost"));
        let err = spec.validate(&json!("bad_host!")).unwrap_err();
        assert!(err.reason.contains("IPv4Address:"));
        assert!(err.reason.contains("ResolvableHostname:"));
    }

    #[test]
    fn test_any_requires_value() {
        assert!(TypeSpec::Any.validate(&Value::Null).is_err());
        assert!(TypeSpec::Any.validate(&json!("")).is_err());
        assert_eq!(TypeSpec::Any.validate(&json!(false)).unwrap(), json!(false));
        assert_eq!(TypeSpec::Any.validate(&json!([])).unwrap(), json!([]));
    }

    #[test]
    fn test_network_types() {
        assert!(TypeSpec::Ipv4Address.validate(&json!("1.2.3.4")).is_ok());
        assert_eq!(
            TypeSpec::Ipv4Subnet.validate(&json!("10.0.0.0/24")).unwrap(),
            json!("10.0.0.0/24")
        );
        assert_eq!(
            TypeSpec::MacAddress
                .validate(&json!("00:1A:2B:3C:4D:5E"))
                .unwrap(),
            json!("00:1a:2b:3c:4d:5e")
        );
        assert!(TypeSpec::Hostname.validate(&json!("")).is_err());
    }

    #[test]
    fn test_resolvable_hostname() {
        let spec = TypeSpec::ResolvableHostname;
        assert_eq!(spec.validate(&json!("localhost")).unwrap(), json!("localhost"));
        let err = spec.validate(&json!("no-such-host.invalid")).unwrap_err();
        assert_eq!(err.expected, "ResolvableHostname");
        assert!(err.reason.contains("could not be resolved"));
        assert!(TypeSpec::Hostname.validate(&json!("no-such-host.invalid")).is_ok());
    }

    #[test]
    fn test_regex() {
        assert!(TypeSpec::Regex.validate(&json!("^a+$")).is_ok());
        assert_eq!(
            TypeSpec::Regex.validate(&json!("(unclosed")).unwrap_err().reason,
            "Invalid regex"
        );
    }
}
