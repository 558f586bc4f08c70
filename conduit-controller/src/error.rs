//! Reconcile error types

use conduit_client::StoreError;
use thiserror::Error;

/// Result type alias for reconcile operations
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Errors that end a reconcile pass
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Store call failed (transport, backend, or conflict on update)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A document did not have the expected shape
    #[error("Invalid document: {0}")]
    Codec(#[from] conduit_core::Error),

    /// The invocation's persisted `spec.services` could not be read
    #[error("services not found in invocation {invocation}")]
    ServicesUnreadable { invocation: String },

    /// A declared service has no entry in the persisted services list
    #[error("service not found: {service}")]
    ServiceNotFound { service: String },

    /// The referenced pipeline template does not exist
    #[error("Pipeline not found: {pipeline}")]
    PipelineNotFound { pipeline: String },

    /// A service child reported an error state
    #[error("Service {service} failed: {message}")]
    ServiceFailed { service: String, message: String },

    /// The invocation has no store-assigned uid, so it cannot own children
    #[error("Invocation {invocation} has no uid")]
    MissingUid { invocation: String },
}

impl ReconcileError {
    /// Whether a later pass may succeed without anyone changing the invocation
    ///
    /// Store failures and missing references can resolve themselves as the store
    /// catches up; a failed service or a malformed document will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::Store(_)
            | ReconcileError::ServicesUnreadable { .. }
            | ReconcileError::ServiceNotFound { .. }
            | ReconcileError::PipelineNotFound { .. }
            | ReconcileError::MissingUid { .. } => true,
            ReconcileError::Codec(_) | ReconcileError::ServiceFailed { .. } => false,
        }
    }

    /// Whether this error is a "not found" from the store
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcileError::Store(e) if e.is_not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_failure_is_terminal() {
        let err = ReconcileError::ServiceFailed {
            service: "registry".to_string(),
            message: "quota exceeded".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_store_errors_are_retryable() {
        let err: ReconcileError = StoreError::not_found("Pipeline", "build").into();
        assert!(err.is_retryable());
        assert!(err.is_not_found());

        let err = ReconcileError::PipelineNotFound {
            pipeline: "build".to_string(),
        };
        assert!(err.is_retryable());
        assert!(!err.is_not_found());
    }
}
