//! Layered configuration loading.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::coerce::coerce_env_value;
use super::{ConfigSource, EnvSource, MergedConfig, ProcessEnv};
use crate::error::{Error, Result};

/// Key holding the environment variable prefix.
pub const PREFIX_KEY: &str = "env_config_prefix";
/// Key holding the user configuration file name.
pub const USER_CONFIG_KEY: &str = "user_config";
/// Prefix used when the application does not declare one.
pub const DEFAULT_PREFIX: &str = "APP_";
/// User configuration file name used when the application does not declare one.
pub const DEFAULT_USER_CONFIG: &str = "userconfig.yml";

/// Structured formats accepted for the user configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Toml,
    Json,
}

impl FileFormat {
    /// Pick a format from the file extension, defaulting to YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => FileFormat::Toml,
            Some(ext) if ext.eq_ignore_ascii_case("json") => FileFormat::Json,
            _ => FileFormat::Yaml,
        }
    }
}

/// Builder that merges defaults, a user file, and the environment.
///
/// ```no_run
/// use apputil::ConfigLayer;
/// use serde_json::json;
///
/// # fn main() -> apputil::Result<()> {
/// let config = ConfigLayer::new("myapp")
///     .defaults(&json!({ "timeout": 30 }))?
///     .env_prefix("MYAPP_")
///     .build()?;
/// assert!(config.contains_key("timeout"));
/// # Ok(())
/// # }
/// ```
pub struct ConfigLayer {
    app_name: String,
    defaults: Map<String, Value>,
    env_prefix: Option<String>,
    user_file: Option<PathBuf>,
    search_dirs: Option<Vec<PathBuf>>,
    env: Box<dyn EnvSource>,
}

impl fmt::Debug for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLayer")
            .field("app_name", &self.app_name)
            .field("defaults", &self.defaults)
            .field("env_prefix", &self.env_prefix)
            .field("user_file", &self.user_file)
            .field("search_dirs", &self.search_dirs)
            .finish_non_exhaustive()
    }
}

impl ConfigLayer {
    /// Start a configuration for the named application.
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            defaults: Map::new(),
            env_prefix: None,
            user_file: None,
            search_dirs: None,
            env: Box::new(ProcessEnv),
        }
    }

    /// Merge default values from anything that serializes to a mapping.
    ///
    /// Keys starting with `_` are treated as private and dropped.
    pub fn defaults<T: Serialize + ?Sized>(mut self, defaults: &T) -> Result<Self> {
        let value = serde_json::to_value(defaults).map_err(|e| Error::ConfigValue {
            key: "<defaults>".to_string(),
            message: e.to_string(),
        })?;
        match value {
            Value::Object(map) => {
                self.defaults
                    .extend(map.into_iter().filter(|(key, _)| !key.starts_with('_')));
                Ok(self)
            }
            other => Err(Error::ConfigValue {
                key: "<defaults>".to_string(),
                message: format!("defaults must be a mapping, found {}", type_name(&other)),
            }),
        }
    }

    /// Add a single default unless one is already declared.
    pub fn default_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.entry(key.into()).or_insert_with(|| value.into());
        self
    }

    /// Set the environment variable prefix, overriding any declared default.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Use this user configuration file instead of the declared one.
    pub fn user_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_file = Some(path.into());
        self
    }

    /// Directories searched for a relative user file missing from the
    /// working directory. Defaults to the executable's directory followed by
    /// the platform config directory for the application.
    pub fn search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = Some(dirs);
        self
    }

    /// Read environment variables from `env` instead of the process.
    pub fn env_source(mut self, env: impl EnvSource + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Merge all sources into an immutable [`MergedConfig`].
    pub fn build(self) -> Result<MergedConfig> {
        let mut merged = MergedConfig::default();

        // Defaults
        for (key, value) in &self.defaults {
            merged.insert(key.clone(), value.clone(), ConfigSource::Default);
        }
        if let Some(prefix) = &self.env_prefix {
            merged.insert(PREFIX_KEY, Value::from(prefix.as_str()), ConfigSource::Default);
        } else if !merged.contains_key(PREFIX_KEY) {
            merged.insert(PREFIX_KEY, Value::from(DEFAULT_PREFIX), ConfigSource::Default);
        }
        if !merged.contains_key(USER_CONFIG_KEY) {
            merged.insert(
                USER_CONFIG_KEY,
                Value::from(DEFAULT_USER_CONFIG),
                ConfigSource::Default,
            );
        }

        // User file
        let user_config_var = merged.env_var_name(USER_CONFIG_KEY);
        let (requested, source) = if let Some(path) = &self.user_file {
            (Some(path.clone()), ConfigSource::Default)
        } else if let Some(path) = self.env.get(&user_config_var) {
            (Some(PathBuf::from(path)), ConfigSource::Environment)
        } else {
            (merged.user_config_path(), ConfigSource::Default)
        };

        if let Some(requested) = requested {
            let path = self.locate(&requested);
            merged.insert(
                USER_CONFIG_KEY,
                Value::from(path.to_string_lossy().into_owned()),
                source,
            );
            if path.is_file() {
                debug!(path = %path.display(), "Loading user config file");
                for (key, value) in load_file(&path)? {
                    if key == USER_CONFIG_KEY {
                        continue;
                    }
                    merged.insert(key, value, ConfigSource::UserFile);
                }
            } else {
                debug!(path = %path.display(), "No user config file found");
            }
        }

        // Environment
        let prefix = merged.prefix().to_string();
        self.overlay_environment(&mut merged, &prefix);

        Ok(merged)
    }

    /// Apply `<prefix>NAME` variables. The prefix and user file keys are
    /// settled before this point and never overridden here.
    fn overlay_environment(&self, merged: &mut MergedConfig, prefix: &str) {
        let mut overrides: Vec<(String, String)> = self
            .env
            .vars()
            .filter(|(name, _)| name.starts_with(prefix))
            .collect();
        overrides.sort();

        for (name, raw) in overrides {
            let stripped = &name[prefix.len()..];
            if stripped.is_empty()
                || stripped.eq_ignore_ascii_case(PREFIX_KEY)
                || stripped.eq_ignore_ascii_case(USER_CONFIG_KEY)
            {
                continue;
            }
            let key = merged
                .find_key_ignore_case(stripped)
                .map(str::to_string)
                .unwrap_or_else(|| stripped.to_lowercase());
            debug!(var = %name, key = %key, "Applying environment override");
            merged.insert(key, coerce_env_value(&raw), ConfigSource::Environment);
        }
    }

    fn locate(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || path.exists() {
            return path.to_path_buf();
        }
        let dirs = self
            .search_dirs
            .clone()
            .unwrap_or_else(|| default_search_dirs(&self.app_name));
        dirs.iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.exists())
            .unwrap_or_else(|| path.to_path_buf())
    }
}

fn default_search_dirs(app_name: &str) -> Vec<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let config_dir = dirs::config_dir().map(|dir| dir.join(app_name));
    exe_dir.into_iter().chain(config_dir).collect()
}

/// Parse a user configuration file into a key/value mapping.
///
/// The format follows the extension: `.toml`, `.json`, or YAML for anything
/// else. An empty document is an empty mapping.
pub fn load_file(path: &Path) -> Result<Map<String, Value>> {
    let content = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_error = |message: String| Error::ConfigParse {
        path: path.to_path_buf(),
        message,
    };

    let value = match FileFormat::from_path(path) {
        FileFormat::Toml => {
            toml::from_str::<Value>(&content).map_err(|e| parse_error(e.to_string()))?
        }
        FileFormat::Json => {
            serde_json::from_str::<Value>(&content).map_err(|e| parse_error(e.to_string()))?
        }
        FileFormat::Yaml => {
            let yaml = serde_yaml::from_str::<serde_yaml::Value>(&content)
                .map_err(|e| parse_error(e.to_string()))?;
            serde_json::to_value(yaml).map_err(|e| parse_error(e.to_string()))?
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(parse_error(format!(
            "expected a mapping at the top level, found {}",
            type_name(&other)
        ))),
    }
}

/// Write `values` as a user configuration file, creating parent directories.
pub fn write_file(path: &Path, values: &Map<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let serialize_error = |message: String| Error::ConfigValue {
        key: path.display().to_string(),
        message,
    };
    let content = match FileFormat::from_path(path) {
        FileFormat::Toml => toml::to_string(values).map_err(|e| serialize_error(e.to_string()))?,
        FileFormat::Json => {
            serde_json::to_string_pretty(values).map_err(|e| serialize_error(e.to_string()))?
        }
        FileFormat::Yaml => {
            serde_yaml::to_string(values).map_err(|e| serialize_error(e.to_string()))?
        }
    };
    fs::write(path, content)?;
    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
