//! CLI error types with exit code handling

use miette::Diagnostic;
use runtime_gvisor_charts::RenderError;
use runtime_gvisor_core::CoreError;
use runtime_gvisor_kube::KubeError;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Controller or provider configuration is invalid
    #[error("Configuration error: {message}")]
    #[diagnostic(code(gvisor::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Chart rendering failed
    #[error("Template error: {message}")]
    #[diagnostic(code(gvisor::cli::template))]
    Template { message: String },

    /// Talking to the cluster failed
    #[error("Kubernetes error: {message}")]
    #[diagnostic(code(gvisor::cli::kubernetes))]
    Kubernetes { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(gvisor::cli::io))]
    Io { message: String },

    /// Invalid command line input
    #[error("{message}")]
    #[diagnostic(code(gvisor::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(gvisor::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Template { .. } => exit_codes::TEMPLATE_ERROR,
            CliError::Kubernetes { .. } => exit_codes::KUBERNETES_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a usage error with help text
    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConfigurationProblem { message } => CliError::Config {
                message,
                help: Some("providerConfig must be a gvisor.runtime.extensions.config.gardener.cloud/v1alpha1 GVisorConfiguration".to_string()),
            },
            CoreError::Io(e) => CliError::from(e),
            other => CliError::config(other.to_string()),
        }
    }
}

impl From<RenderError> for CliError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Core(e) => CliError::from(e),
            RenderError::Io(e) => CliError::from(e),
            // keep the source snippet of template errors
            other => CliError::Template {
                message: format!("{:?}", miette::Report::new(other)),
            },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::InvalidConfig(message) => CliError::config(message),
            KubeError::ConfigurationProblem { message } => CliError::config(message),
            KubeError::Core(e) => CliError::from(e),
            KubeError::Render(e) => CliError::from(e),
            other => CliError::Kubernetes {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
