//! Error types for the vigil-persist crate.

use thiserror::Error;

/// Errors that can occur while reading or writing persisted state.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The storage key is not usable.
    #[error("invalid storage key {key:?}: {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why the key was rejected.
        reason: String,
    },

    /// The backend failed to read or write.
    #[error("i/o error on {key}: {source}")]
    Io {
        /// The key being accessed.
        key: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The value could not be serialized.
    #[error("failed to encode {key}: {reason}")]
    Encode {
        /// The key being written.
        key: String,
        /// The serializer's message.
        reason: String,
    },

    /// The stored bytes could not be deserialized.
    #[error("failed to decode {key}: {reason}")]
    Decode {
        /// The key being read.
        key: String,
        /// The deserializer's message.
        reason: String,
    },

    /// The backend did not complete the operation in time.
    #[error("storage operation on {key} timed out")]
    Timeout {
        /// The key being accessed.
        key: String,
    },
}

/// Result type for persistence operations.
pub type Result<T> = std::result::Result<T, PersistError>;
