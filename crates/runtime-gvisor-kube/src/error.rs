//! Error types for runtime-gvisor-kube

use runtime_gvisor_charts::RenderError;
use runtime_gvisor_core::CoreError;
use runtime_gvisor_core::error::ERROR_CONFIGURATION_PROBLEM;
use thiserror::Error;

/// Result type for runtime-gvisor-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while reconciling ContainerRuntimes
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Provider configuration could not be decoded
    #[error("configuration problem: {message}")]
    ConfigurationProblem { message: String },

    /// Chart rendering failed
    #[error("chart rendering failed: {0}")]
    Render(#[from] RenderError),

    /// Core model error (image vector, shoot decoding, ...)
    #[error(transparent)]
    Core(CoreError),

    /// The Cluster resource of a shoot namespace does not exist
    #[error("cluster '{name}' not found")]
    ClusterNotFound { name: String },

    /// A resource is missing data the controller relies on
    #[error("invalid resource: {0}")]
    InvalidResource(String),

    /// Invalid controller configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Timeout
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<CoreError> for KubeError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::ConfigurationProblem { message } => KubeError::ConfigurationProblem { message },
            other => KubeError::Core(other),
        }
    }
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 404)
    }

    /// Whether the error was caused by user configuration
    pub fn is_configuration_problem(&self) -> bool {
        matches!(self, KubeError::ConfigurationProblem { .. })
    }

    /// Error codes reported in `status.lastError.codes`
    pub fn codes(&self) -> Vec<String> {
        match self {
            KubeError::ConfigurationProblem { .. } => {
                vec![ERROR_CONFIGURATION_PROBLEM.to_string()]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> KubeError {
        KubeError::Api(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "NotFound".to_string(),
            code,
        }))
    }

    #[test]
    fn test_is_not_found() {
        assert!(api_error(404).is_not_found());
        assert!(!api_error(500).is_not_found());
    }

    #[test]
    fn test_configuration_problem_from_core() {
        let err: KubeError = CoreError::configuration("bad kind").into();
        assert!(err.is_configuration_problem());
        assert_eq!(err.codes(), vec!["ERR_CONFIGURATION_PROBLEM".to_string()]);
    }

    #[test]
    fn test_other_core_errors_have_no_codes() {
        let err: KubeError = CoreError::ImageNotFound {
            name: "x".to_string(),
        }
        .into();
        assert!(!err.is_configuration_problem());
        assert!(err.codes().is_empty());
    }
}
