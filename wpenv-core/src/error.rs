pub use anyhow::bail;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Error surface for the configuration pipeline.
///
/// `Validation` is the one recognizable user-facing kind: it marks a problem
/// the user can fix in their configuration (bad JSON, unknown key, malformed
/// source string, conflicting ports). Callers print its message without a
/// backtrace. Every other variant is an unexpected/internal failure and gets
/// the full diagnostic treatment.
#[derive(Error, Debug)]
pub enum WpEnvError {
    Validation(String),
    Io(#[from] std::io::Error),
    Serialization(String),
    Template(String),
    Internal(String),
    Other(#[from] anyhow::Error),
}

impl Display for WpEnvError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            WpEnvError::Validation(s) => write!(f, "{}", s),
            WpEnvError::Io(e) => write!(f, "I/O error: {}", e),
            WpEnvError::Serialization(s) => write!(f, "Serialization error: {}", s),
            WpEnvError::Template(s) => write!(f, "Template error: {}", s),
            WpEnvError::Internal(s) => write!(f, "Internal error: {}", s),
            WpEnvError::Other(e) => write!(f, "Other error: {}", e),
        }
    }
}

impl WpEnvError {
    /// Whether this error represents a user-fixable configuration problem.
    pub fn is_validation(&self) -> bool {
        matches!(self, WpEnvError::Validation(_))
    }
}

impl From<serde_yaml_ng::Error> for WpEnvError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        WpEnvError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for WpEnvError {
    fn from(err: serde_json::Error) -> Self {
        WpEnvError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WpEnvError>;
