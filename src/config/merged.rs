//! The merged, read-only configuration view.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use super::loader::{DEFAULT_PREFIX, PREFIX_KEY, USER_CONFIG_KEY};
use super::ConfigSource;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    value: Value,
    source: ConfigSource,
}

/// Configuration merged from defaults, the user file, and the environment.
///
/// Built once by [`ConfigLayer`](super::ConfigLayer) and immutable afterwards,
/// so lookups are pure and the value can be shared freely between threads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedConfig {
    entries: BTreeMap<String, Entry>,
}

impl MergedConfig {
    /// Look up the raw value for `key`.
    pub fn resolve(&self, key: &str) -> Result<&Value> {
        self.entries
            .get(key)
            .map(|entry| &entry.value)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Look up `key` and deserialize it into `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.resolve(key)?;
        serde_json::from_value(value.clone()).map_err(|e| Error::ConfigValue {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Like [`get`](Self::get), returning `None` when the key is absent.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            Ok(value) => Ok(Some(value)),
            Err(Error::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Like [`get`](Self::get), returning `fallback` when the key is absent.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, fallback: T) -> Result<T> {
        Ok(self.get_opt(key)?.unwrap_or(fallback))
    }

    /// Which source supplied the value for `key`.
    pub fn source_of(&self, key: &str) -> Option<ConfigSource> {
        self.entries.get(key).map(|entry| entry.source)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Environment variable prefix in effect.
    pub fn prefix(&self) -> &str {
        self.entries
            .get(PREFIX_KEY)
            .and_then(|entry| entry.value.as_str())
            .unwrap_or(DEFAULT_PREFIX)
    }

    /// Name of the environment variable that overrides `key`.
    pub fn env_var_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix(), key.to_uppercase())
    }

    /// Path of the user configuration file that was consulted, if any.
    pub fn user_config_path(&self) -> Option<PathBuf> {
        self.entries
            .get(USER_CONFIG_KEY)
            .and_then(|entry| entry.value.as_str())
            .map(PathBuf::from)
    }

    /// Iterate over keys and values in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), &entry.value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dump the effective configuration with the source of each value.
    pub fn to_json_with_sources(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(key, entry)| {
                (
                    key.clone(),
                    json!({ "value": entry.value, "source": entry.source }),
                )
            })
            .collect();
        Value::Object(map)
    }

    /// Existing key spelled like `name` ignoring ASCII case.
    pub(crate) fn find_key_ignore_case(&self, name: &str) -> Option<&str> {
        if self.entries.contains_key(name) {
            return self.entries.get_key_value(name).map(|(k, _)| k.as_str());
        }
        self.entries
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, value: Value, source: ConfigSource) {
        self.entries.insert(key.into(), Entry { value, source });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MergedConfig {
        let mut config = MergedConfig::default();
        config.insert("timeout", json!(30), ConfigSource::Default);
        config.insert("name", json!("demo"), ConfigSource::UserFile);
        config.insert(PREFIX_KEY, json!("MYAPP_"), ConfigSource::Default);
        config
    }

    #[test]
    fn test_resolve_missing_key() {
        let config = sample();
        assert!(matches!(
            config.resolve("missing"),
            Err(Error::KeyNotFound(key)) if key == "missing"
        ));
    }

    #[test]
    fn test_typed_get() {
        let config = sample();
        assert_eq!(config.get::<u64>("timeout").unwrap(), 30);
        assert_eq!(config.get::<String>("name").unwrap(), "demo");
        assert!(matches!(
            config.get::<u64>("name"),
            Err(Error::ConfigValue { .. })
        ));
        assert_eq!(config.get_opt::<u64>("missing").unwrap(), None);
        assert_eq!(config.get_or("missing", 7u64).unwrap(), 7);
    }

    #[test]
    fn test_env_var_name_uses_prefix() {
        let config = sample();
        assert_eq!(config.prefix(), "MYAPP_");
        assert_eq!(config.env_var_name("timeout"), "MYAPP_TIMEOUT");
        assert_eq!(MergedConfig::default().env_var_name("x"), "APP_X");
    }

    #[test]
    fn test_sources_are_recorded() {
        let config = sample();
        assert_eq!(config.source_of("timeout"), Some(ConfigSource::Default));
        assert_eq!(config.source_of("name"), Some(ConfigSource::UserFile));
        let dump = config.to_json_with_sources();
        assert_eq!(dump["name"]["source"], json!("user_file"));
        assert_eq!(dump["timeout"]["value"], json!(30));
    }

    #[test]
    fn test_find_key_ignore_case() {
        let config = sample();
        assert_eq!(config.find_key_ignore_case("TIMEOUT"), Some("timeout"));
        assert_eq!(config.find_key_ignore_case("timeout"), Some("timeout"));
        assert_eq!(config.find_key_ignore_case("nope"), None);
    }
}
