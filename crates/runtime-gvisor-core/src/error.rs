//! Core error types

use thiserror::Error;

/// Error code attached to errors caused by user-supplied configuration
pub const ERROR_CONFIGURATION_PROBLEM: &str = "ERR_CONFIGURATION_PROBLEM";

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("configuration problem: {message}")]
    ConfigurationProblem { message: String },

    #[error("image '{name}' not found in image vector")]
    ImageNotFound { name: String },

    #[error("invalid image vector: {message}")]
    InvalidImageVector { message: String },

    #[error("invalid shoot in cluster resource '{cluster}': {message}")]
    InvalidShoot { cluster: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Values merge error: {message}")]
    ValuesMerge { message: String },
}

impl CoreError {
    /// Create a configuration problem error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationProblem {
            message: message.into(),
        }
    }

    /// Whether this error was caused by invalid user configuration
    pub fn is_configuration_problem(&self) -> bool {
        matches!(self, Self::ConfigurationProblem { .. })
    }

    /// Error codes reported in `status.lastError.codes`
    pub fn codes(&self) -> Vec<String> {
        match self {
            Self::ConfigurationProblem { .. } => vec![ERROR_CONFIGURATION_PROBLEM.to_string()],
            _ => Vec::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
