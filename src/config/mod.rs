//! Configuration management module.
//!
//! Merges three sources in increasing precedence:
//! - built-in defaults supplied by the application
//! - a user configuration file (YAML, TOML, or JSON)
//! - environment variables named `<PREFIX><UPPERCASED_KEY>`

mod coerce;
mod loader;
mod merged;
mod source;

pub use coerce::coerce_env_value;
pub use loader::{
    load_file, write_file, ConfigLayer, FileFormat, DEFAULT_PREFIX, DEFAULT_USER_CONFIG,
    PREFIX_KEY, USER_CONFIG_KEY,
};
pub use merged::MergedConfig;
pub use source::{ConfigSource, EnvSource, MapEnv, ProcessEnv};
