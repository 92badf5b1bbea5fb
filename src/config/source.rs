//! Configuration sources and environment access.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a configuration value came from.
///
/// Variants are ordered by precedence: a value from a later variant
/// overrides the same key from an earlier one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Built-in application defaults
    Default,
    /// User configuration file
    UserFile,
    /// Prefixed environment variables
    Environment,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigSource::Default => "default",
            ConfigSource::UserFile => "user file",
            ConfigSource::Environment => "environment",
        };
        f.write_str(name)
    }
}

/// Read access to a set of environment variables.
pub trait EnvSource {
    /// Get the value of an environment variable by name.
    fn get(&self, name: &str) -> Option<String>;

    /// Iterate over all environment variables.
    fn vars(&self) -> Box<dyn Iterator<Item = (String, String)> + '_>;
}

/// Environment source backed by the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn vars(&self) -> Box<dyn Iterator<Item = (String, String)> + '_> {
        // Skip non-unicode entries instead of panicking like `std::env::vars`
        Box::new(std::env::vars_os().filter_map(|(name, value)| {
            Some((name.into_string().ok()?, value.into_string().ok()?))
        }))
    }
}

/// Environment source backed by a map, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: BTreeMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an environment from an iterator of name/value pairs.
    pub fn from_pairs<I, K, V>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Set a variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }
}

impl EnvSource for MapEnv {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn vars(&self) -> Box<dyn Iterator<Item = (String, String)> + '_> {
        Box::new(self.vars.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_precedence_order() {
        assert!(ConfigSource::Environment > ConfigSource::UserFile);
        assert!(ConfigSource::UserFile > ConfigSource::Default);
        assert_eq!(
            [
                ConfigSource::Environment,
                ConfigSource::Default,
                ConfigSource::UserFile
            ]
            .iter()
            .max(),
            Some(&ConfigSource::Environment)
        );
    }

    #[test]
    fn test_map_env_lookup() {
        let mut env = MapEnv::from_pairs([("APP_TIMEOUT", "60")]);
        env.set("APP_NAME", "demo");
        assert_eq!(env.get("APP_TIMEOUT").as_deref(), Some("60"));
        assert_eq!(env.get("MISSING"), None);
        assert_eq!(env.vars().count(), 2);
    }
}
