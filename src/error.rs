//! Error types for the klusterlet addon operator

use thiserror::Error;

/// Result type alias for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

/// Infrastructure errors that abort a reconcile cycle.
///
/// Diagnosis problems (failed manifests, stale leases) are not represented
/// here; they end up in the addon's `Degraded` condition instead.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeApi(String),
    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl OperatorError {
    /// Whether this error only signals the absence of an object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, OperatorError::NotFound(_))
    }
}

impl From<kube::Error> for OperatorError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => OperatorError::NotFound(ae.message),
            other => OperatorError::KubeApi(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::Serialization(err.to_string())
    }
}
