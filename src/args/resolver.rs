//! Builds a clap command whose defaults come from the merged configuration.

use std::ffi::OsString;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;
use tracing::debug;

use super::spec::{ArgKind, ArgumentSpec};
use super::values::Args;
use crate::config::MergedConfig;
use crate::error::{Error, Result};
use crate::validate::render_value;

const DEBUG_ID: &str = "debug";

const ENV_EPILOG: &str = "Options marked with (env: NAME) can also be set through that \
environment variable. When both are given, the command line wins.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DefaultOrigin {
    Explicit,
    Config,
}

/// Command-line front end backed by a [`MergedConfig`].
#[derive(Debug)]
pub struct ArgumentResolver<'a> {
    name: String,
    about: Option<String>,
    version: Option<String>,
    config: &'a MergedConfig,
    specs: Vec<ArgumentSpec>,
    debug_flag: bool,
}

impl<'a> ArgumentResolver<'a> {
    pub fn new(name: impl Into<String>, config: &'a MergedConfig) -> Self {
        Self {
            name: name.into(),
            about: None,
            version: None,
            config,
            specs: Vec::new(),
            debug_flag: true,
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn arg(mut self, spec: ArgumentSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Drop the built-in `-d/--debug` verbosity flag.
    pub fn without_debug_flag(mut self) -> Self {
        self.debug_flag = false;
        self
    }

    pub fn config(&self) -> &'a MergedConfig {
        self.config
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn effective_default(&self, spec: &ArgumentSpec) -> Option<(Value, DefaultOrigin)> {
        if let Some(value) = &spec.default {
            return Some((value.clone(), DefaultOrigin::Explicit));
        }
        self.config
            .resolve(&spec.name)
            .ok()
            .filter(|value| !value.is_null())
            .map(|value| (value.clone(), DefaultOrigin::Config))
    }

    fn is_required(&self, spec: &ArgumentSpec) -> bool {
        spec.kind == ArgKind::Value
            && !spec.type_spec.is_optional()
            && self.effective_default(spec).is_none()
    }

    pub(crate) fn help_text(&self, spec: &ArgumentSpec) -> String {
        let mut parts = Vec::new();
        if let Some(help) = &spec.help {
            parts.push(help.clone());
        }
        if spec.kind == ArgKind::Value {
            parts.push(format!("[{}]", spec.type_spec));
        }
        if let Some((value, origin)) = self.effective_default(spec) {
            parts.push(format!("(default: {})", render_value(&value)));
            if origin == DefaultOrigin::Config {
                parts.push(format!("(env: {})", self.config.env_var_name(&spec.name)));
            }
        }
        parts.join(" ")
    }

    /// The clap command for the declared flags.
    pub fn command(&self) -> Command {
        let mut command = Command::new(self.name.clone()).after_help(ENV_EPILOG);
        if let Some(about) = &self.about {
            command = command.about(about.clone());
        }
        if let Some(version) = &self.version {
            command = command.version(version.clone());
        }

        for spec in &self.specs {
            let mut arg = Arg::new(spec.name.clone())
                .long(spec.long())
                .help(self.help_text(spec));
            if let Some(short) = spec.short {
                arg = arg.short(short);
            }
            arg = match spec.kind {
                ArgKind::Switch => arg.action(ArgAction::SetTrue),
                ArgKind::Value => {
                    let value_name = spec
                        .value_name
                        .clone()
                        .unwrap_or_else(|| spec.name.to_uppercase());
                    arg.action(ArgAction::Set)
                        .value_name(value_name)
                        .required(self.is_required(spec))
                }
            };
            command = command.arg(arg);
        }

        if self.debug_flag {
            command = command.arg(
                Arg::new(DEBUG_ID)
                    .short('d')
                    .long("debug")
                    .action(ArgAction::Count)
                    .help("Display more verbose messages (repeat for more)"),
            );
        }
        command
    }

    pub fn render_help(&self) -> String {
        self.command().render_help().to_string()
    }

    /// Run clap over `argv` without validating values.
    pub fn matches_from<I, T>(&self, argv: I) -> std::result::Result<ArgMatches, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        self.command().try_get_matches_from(argv)
    }

    /// Fill in defaults and validate every flag.
    pub fn resolve(&self, matches: &ArgMatches) -> Result<Args> {
        let mut args = Args::new();
        let mut errors = Vec::new();

        for spec in &self.specs {
            let given = matches.value_source(&spec.name) == Some(ValueSource::CommandLine);
            let raw = match spec.kind {
                ArgKind::Switch if given => Value::Bool(true),
                ArgKind::Switch => self
                    .effective_default(spec)
                    .map_or(Value::Bool(false), |(value, _)| value),
                ArgKind::Value => match matches.get_one::<String>(&spec.name) {
                    Some(value) if given => Value::String(value.clone()),
                    _ => self
                        .effective_default(spec)
                        .map_or(Value::Null, |(value, _)| value),
                },
            };

            debug!(arg = %spec.name, from_command_line = given, "Resolving argument");
            match spec.type_spec.validate_as(&spec.name, &raw) {
                Ok(value) => {
                    args.insert(spec.name.clone(), value);
                }
                Err(err) => errors.push(err),
            }
        }

        if !errors.is_empty() {
            return Err(Error::InvalidArguments(errors));
        }
        if self.debug_flag {
            args.insert(DEBUG_ID, Self::debug_level(matches));
        }
        Ok(args)
    }

    /// Number of times `-d/--debug` was given.
    pub fn debug_level(matches: &ArgMatches) -> u8 {
        matches
            .try_get_one::<u8>(DEBUG_ID)
            .ok()
            .flatten()
            .copied()
            .unwrap_or(0)
    }

    pub fn parse_from<I, T>(&self, argv: I) -> Result<Args>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.matches_from(argv)?;
        self.resolve(&matches)
    }

    /// Parse the process command line.
    pub fn parse(&self) -> Result<Args> {
        self.parse_from(std::env::args_os())
    }
}
