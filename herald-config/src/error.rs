// Push settings errors

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single rule a settings value failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub reason: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.reason)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file extension maps to no known settings format.
    #[error("no settings format for {}", .0.display())]
    UnsupportedFile(PathBuf),

    #[error("cannot read settings from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON/TOML, or its root is not a table.
    #[error("malformed {format} settings: {message}")]
    Malformed { format: &'static str, message: String },

    /// The table parsed but its keys do not fit [`PushSettings`](crate::PushSettings).
    #[error("settings do not fit the expected shape: {0}")]
    Shape(String),

    /// A scalar override (usually an environment variable) failed to parse.
    #[error("cannot use {value:?} for {key}: {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("environment variable {name}: {source}")]
    Env {
        name: String,
        #[source]
        source: std::env::VarError,
    },

    #[error("dotenv: {0}")]
    Dotenv(#[from] dotenvy::Error),

    #[error("settings rejected: {}", list(.0))]
    Rejected(Vec<Violation>),
}

fn list(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    /// True when the settings loaded but failed validation.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Fields named by a validation failure, empty otherwise.
    pub fn rejected_fields(&self) -> Vec<&str> {
        match self {
            Self::Rejected(violations) => violations.iter().map(|v| v.field.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<ConfigError> for herald_push::PushError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
