//! Error types for entigraph core.

use crate::types::CommitVersion;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in entigraph core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Store bookkeeping no longer matches the tracked graph.
    ///
    /// This is a programming error; the operation that raised it was aborted
    /// and whatever it had already applied stays applied.
    #[error("store invariant violated: {message}")]
    InvariantViolation {
        /// Description of the violated invariant.
        message: String,
    },

    /// The operation has no defined meaning for this kind of session.
    #[error("operation not supported: {operation}")]
    Unsupported {
        /// Name of the rejected operation.
        operation: &'static str,
    },

    /// Another session committed since this session last synchronized.
    #[error(
        "cannot commit on stale data: session observed {observed}, store is at {current}; re-query and retry"
    )]
    StaleSession {
        /// Version the session last observed.
        observed: CommitVersion,
        /// Version the store is at now.
        current: CommitVersion,
    },

    /// More than one back-reference field could point at a newly added entity.
    #[error(
        "ambiguous back reference: {type_name} declares several back references to {target}; declare at most one"
    )]
    AmbiguousBackReference {
        /// Type holding the candidate fields.
        type_name: &'static str,
        /// Type of the newly added entity.
        target: &'static str,
    },

    /// The entity is not known to the store or session.
    #[error("entity of type {type_name} is not tracked")]
    NotTracked {
        /// Type of the entity.
        type_name: &'static str,
    },

    /// A numeric identity generator ran out of values.
    #[error("identity values exhausted for key type {type_name}")]
    IdentityExhausted {
        /// Key type that overflowed.
        type_name: &'static str,
    },
}

impl CoreError {
    /// Creates an invariant violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    /// Creates a stale session error.
    pub fn stale(observed: CommitVersion, current: CommitVersion) -> Self {
        Self::StaleSession { observed, current }
    }

    /// Creates a not tracked error.
    pub fn not_tracked(type_name: &'static str) -> Self {
        Self::NotTracked { type_name }
    }

    /// Returns true if the caller can recover by refreshing and retrying.
    ///
    /// Only staleness is recoverable; everything else is a configuration
    /// or programming error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::StaleSession { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_is_recoverable() {
        let err = CoreError::stale(CommitVersion::new(1), CommitVersion::new(2));
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("re-query"));
    }

    #[test]
    fn invariant_is_fatal() {
        let err = CoreError::invariant("node 3 vanished");
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "store invariant violated: node 3 vanished");
    }

    #[test]
    fn unsupported_names_operation() {
        let err = CoreError::unsupported("reload");
        assert_eq!(err.to_string(), "operation not supported: reload");
    }
}
