//! Command-line flag declarations.

use serde_json::Value;

use crate::validate::TypeSpec;

/// How a flag consumes the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// `--flag VALUE`
    Value,
    /// `--flag` with no value; true when present
    Switch,
}

/// Declaration of one command-line flag.
///
/// When no explicit default is given, the default comes from the
/// configuration key with the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSpec {
    pub(crate) name: String,
    pub(crate) short: Option<char>,
    pub(crate) kind: ArgKind,
    pub(crate) type_spec: TypeSpec,
    pub(crate) default: Option<Value>,
    pub(crate) help: Option<String>,
    pub(crate) value_name: Option<String>,
}

impl ArgumentSpec {
    /// Flag taking a value validated by `type_spec`.
    pub fn new(name: impl Into<String>, type_spec: TypeSpec) -> Self {
        Self {
            name: name.into(),
            short: None,
            kind: ArgKind::Value,
            type_spec,
            default: None,
            help: None,
            value_name: None,
        }
    }

    /// Boolean switch.
    pub fn switch(name: impl Into<String>) -> Self {
        Self {
            kind: ArgKind::Switch,
            ..Self::new(name, TypeSpec::Bool)
        }
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Explicit default; configuration is not consulted for this flag.
    pub fn default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn value_name(mut self, value_name: impl Into<String>) -> Self {
        self.value_name = Some(value_name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ArgKind {
        self.kind
    }

    pub fn type_spec(&self) -> &TypeSpec {
        &self.type_spec
    }

    /// Long flag spelling: the name with `_` replaced by `-`.
    pub fn long(&self) -> String {
        self.name.replace('_', "-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_name() {
        let spec = ArgumentSpec::new("user_name", TypeSpec::non_empty_string());
        assert_eq!(spec.long(), "user-name");
        assert_eq!(spec.name(), "user_name");
        assert_eq!(spec.kind(), ArgKind::Value);
    }

    #[test]
    fn test_switch_is_bool() {
        let spec = ArgumentSpec::switch("verbose").short('v');
        assert_eq!(spec.kind(), ArgKind::Switch);
        assert_eq!(spec.type_spec(), &TypeSpec::Bool);
        assert_eq!(spec.short, Some('v'));
    }
}
