use std::fmt;
use std::path::PathBuf;

use rla_security::UnknownUserMethod;

/// Failures while reading settings or turning rule definitions into rules.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read row level access configuration '{}': {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid row level access configuration '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid row level access settings: {0}")]
    Settings(#[source] Box<figment::Error>),

    #[error("rule type '{rule_type}' for model '{model}' does not exist")]
    UnknownRuleType { model: String, rule_type: String },

    #[error("invalid options for model '{model}': {message}")]
    InvalidOptions { model: String, message: String },
}

impl ConfigError {
    #[must_use]
    pub fn invalid_options(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            model: model.into(),
            message: message.into(),
        }
    }
}

/// Which end of a configured join failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    From,
    To,
}

impl fmt::Display for JoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::From => f.write_str("first"),
            Self::To => f.write_str("second"),
        }
    }
}

/// A rule received input it cannot turn into a filter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidArgument {
    #[error(
        "user method '{method}' returned a {kind} value, expected a scalar, an object with a string form, or a list of those"
    )]
    UnsupportedValue { method: String, kind: &'static str },

    #[error("{side} argument of join {index} is invalid, expected an existing model field (got '{identifier}')")]
    InvalidJoin {
        index: usize,
        side: JoinSide,
        identifier: String,
    },

    #[error("field '{field}' does not resolve to a model column")]
    UnknownField { field: String },
}

/// A rule is not set up well enough to run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("user method must be set before rule on field '{field}' can be used")]
    UserMethodNotSet { field: String },

    #[error(transparent)]
    UnknownUserMethod(#[from] UnknownUserMethod),
}

/// Any failure raised while loading or applying row level access rules.
#[derive(Debug, thiserror::Error)]
pub enum RlaError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    InvalidArgument(#[from] InvalidArgument),

    #[error(transparent)]
    Setup(#[from] SetupError),
}

impl From<UnknownUserMethod> for RlaError {
    fn from(e: UnknownUserMethod) -> Self {
        Self::Setup(SetupError::from(e))
    }
}
