//! Error types for the vigil-alerts crate.

use thiserror::Error;
use vigil_persist::PersistError;

/// Errors that can occur in the alerting engine.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Rule fields violate an invariant.
    #[error("invalid alert rule: {reason}")]
    Validation {
        /// The reason the rule is invalid.
        reason: String,
    },

    /// No rule with the given ID exists.
    #[error("rule not found: {id}")]
    RuleNotFound {
        /// The rule ID that was not found.
        id: String,
    },

    /// Reading or writing persisted state failed.
    #[error("storage error: {0}")]
    Storage(#[from] PersistError),
}

impl AlertError {
    /// Shorthand for a [`AlertError::Validation`] error.
    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Returns true for validation failures.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns true for persistence failures.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type for alerting operations.
pub type Result<T> = std::result::Result<T, AlertError>;

/// A delivery target refused or failed to process an alert.
#[derive(Debug, Clone, Error)]
#[error("handler {handler} failed: {reason}")]
pub struct HandlerError {
    /// Name of the handler that failed.
    pub handler: String,
    /// Why delivery failed.
    pub reason: String,
}

impl HandlerError {
    /// Creates a handler error.
    pub fn new(handler: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            reason: reason.into(),
        }
    }
}
