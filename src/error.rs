//! Error types for apputil.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for apputil.
#[derive(Debug, Error)]
pub enum Error {
    /// User configuration file has malformed syntax or is not a mapping
    #[error("Failed to parse config file {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// User configuration file exists but could not be read
    #[error("Failed to read config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Lookup miss in every configuration source
    #[error("Configuration key '{0}' not found")]
    KeyNotFound(String),

    /// A configuration value could not be converted to the requested type
    #[error("Configuration key '{key}' has an unexpected value: {message}")]
    ConfigValue { key: String, message: String },

    /// A validated argument was requested but never supplied
    #[error("Argument '{0}' was not supplied")]
    MissingArgument(String),

    /// A single value failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// One or more arguments failed validation
    #[error("{}", join_lines(.0))]
    InvalidArguments(Vec<ValidationError>),

    /// Command-line usage error, including help and version requests
    #[error(transparent)]
    Usage(#[from] clap::Error),

    /// Signal handlers could not be installed
    #[error("Failed to install signal handlers: {0}")]
    Signal(String),

    /// Logging could not be initialized
    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether retrying the failed operation could succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Validation failures carried by this error, if any.
    ///
    /// A typed `Args` getter that cannot convert a value also reports here.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Error::Validation(err) => std::slice::from_ref(err),
            Error::InvalidArguments(errors) => errors,
            _ => &[],
        }
    }
}

/// A value that could not be coerced to its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for {key} - {reason} (expected {expected})")]
pub struct ValidationError {
    /// Name of the offending flag, parameter, or key
    pub key: String,
    /// Human-readable description of the accepted type
    pub expected: String,
    /// Why the value was rejected
    pub reason: String,
}

impl ValidationError {
    pub fn new(
        key: impl Into<String>,
        expected: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            expected: expected.into(),
            reason: reason.into(),
        }
    }
}

fn join_lines(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
