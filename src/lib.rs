//! apputil: application scaffolding for command-line tools.
//!
//! Layers configuration from defaults, a user file, and environment
//! variables; derives command-line flag defaults from that configuration;
//! validates values against declared types; and runs the application entry
//! point inside signal handling and a catch-all error boundary.
//!
//! ```no_run
//! use apputil::{AppRunner, ArgumentResolver, ArgumentSpec, ConfigLayer, TypeSpec};
//! use serde_json::json;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ConfigLayer::new("tool")
//!         .defaults(&json!({ "env_config_prefix": "TOOL_", "retries": 3 }))?
//!         .build()?;
//!     let resolver = ArgumentResolver::new("tool", &config)
//!         .arg(ArgumentSpec::new("retries", TypeSpec::positive_integer()));
//!
//!     AppRunner::new("tool")
//!         .run_cli(&resolver, |args, _shutdown| {
//!             println!("retries = {}", args.value::<u32>("retries")?);
//!             Ok(())
//!         })
//!         .exit()
//! }
//! ```

pub mod args;
pub mod config;
pub mod error;
pub mod logger;
pub mod runner;
pub mod validate;

pub use args::{ArgKind, ArgumentResolver, ArgumentSpec, Args};
pub use config::{ConfigLayer, ConfigSource, MergedConfig};
pub use error::{Error, Result, ValidationError};
pub use runner::{AppRunner, ExitCodes, ExitValue, RunOutcome, RunState, Shutdown};
pub use serde_json::Value;
pub use validate::{ParamTable, StrSpec, TypeSpec};
