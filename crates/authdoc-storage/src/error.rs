//! Storage error types for the document store driver contract.
//!
//! This module defines all error types that a driver can report.

use std::fmt;
use std::time::Duration;

/// Errors that can occur during document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A write carried a version expectation that no longer matches.
    #[error("Version conflict on {collection}/{id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// Collection of the conflicting document.
        collection: String,
        /// Key of the conflicting document.
        id: String,
        /// The change vector the writer expected.
        expected: String,
        /// The change vector actually stored.
        actual: String,
    },

    /// Attempted to create a document whose key is already taken.
    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists {
        /// Collection of the existing document.
        collection: String,
        /// Key of the existing document.
        id: String,
    },

    /// A unique value is reserved by another document.
    #[error("Unique constraint violated: {key} is held by {owner}")]
    UniqueViolation {
        /// The reserved key.
        key: String,
        /// Key of the document holding the reservation.
        owner: String,
    },

    /// The query targets an index that was never registered.
    #[error("Index not found: {name}")]
    IndexNotFound {
        /// Name of the missing index.
        name: String,
    },

    /// The query cannot be executed as written.
    #[error("Invalid query: {message}")]
    InvalidQuery {
        /// Description of why the query is invalid.
        message: String,
    },

    /// Waiting for a non-stale index timed out.
    #[error("Index {name} is still stale after {timeout:?}")]
    StaleIndex {
        /// Name of the stale index.
        name: String,
        /// How long the caller was willing to wait.
        timeout: Duration,
    },

    /// A set-based operation stopped before processing every match.
    #[error("Operation {operation} failed after {completed} documents: {message}")]
    OperationFailed {
        /// Identifier of the operation.
        operation: u64,
        /// Number of documents processed before the failure.
        completed: u64,
        /// Description of the failure.
        message: String,
    },

    /// The call was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// A document body could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to reach the storage backend.
    #[error("Connection error: {message}")]
    ConnectionError {
        /// Description of the connection error.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `VersionConflict` error.
    #[must_use]
    pub fn version_conflict(
        collection: impl Into<String>,
        id: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::VersionConflict {
            collection: collection.into(),
            id: id.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates a new `UniqueViolation` error.
    #[must_use]
    pub fn unique_violation(key: impl Into<String>, owner: impl Into<String>) -> Self {
        Self::UniqueViolation {
            key: key.into(),
            owner: owner.into(),
        }
    }

    /// Creates a new `IndexNotFound` error.
    #[must_use]
    pub fn index_not_found(name: impl Into<String>) -> Self {
        Self::IndexNotFound { name: name.into() }
    }

    /// Creates a new `InvalidQuery` error.
    #[must_use]
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates a new `StaleIndex` error.
    #[must_use]
    pub fn stale_index(name: impl Into<String>, timeout: Duration) -> Self {
        Self::StaleIndex {
            name: name.into(),
            timeout,
        }
    }

    /// Creates a new `OperationFailed` error.
    #[must_use]
    pub fn operation_failed(operation: u64, completed: u64, message: impl Into<String>) -> Self {
        Self::OperationFailed {
            operation,
            completed,
            message: message.into(),
        }
    }

    /// Creates a new `ConnectionError` error.
    #[must_use]
    pub fn connection_error(message: impl Into<String>) -> Self {
        Self::ConnectionError {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a version conflict error.
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Returns `true` if the write collided with an existing key or unique value.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists { .. } | Self::UniqueViolation { .. }
        )
    }

    /// Returns `true` if this is a missing index error.
    #[must_use]
    pub fn is_index_not_found(&self) -> bool {
        matches!(self, Self::IndexNotFound { .. })
    }

    /// Returns `true` if the call was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::VersionConflict { .. } => ErrorCategory::Conflict,
            Self::AlreadyExists { .. } | Self::UniqueViolation { .. } => ErrorCategory::Conflict,
            Self::IndexNotFound { .. } | Self::InvalidQuery { .. } => ErrorCategory::Validation,
            Self::Serialization(_) => ErrorCategory::Validation,
            Self::StaleIndex { .. } => ErrorCategory::Timeout,
            Self::OperationFailed { .. } => ErrorCategory::Operation,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::ConnectionError { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Version, key or unique-value conflict.
    Conflict,
    /// Malformed query, document or index reference.
    Validation,
    /// Gave up waiting on the store.
    Timeout,
    /// Set-based operation failure.
    Operation,
    /// Caller cancellation.
    Cancelled,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Timeout => write!(f, "timeout"),
            Self::Operation => write!(f, "operation"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
