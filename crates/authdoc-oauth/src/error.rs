//! Store error types.
//!
//! Every entity store operation returns [`StoreError`]. Absence is never an
//! error: lookups return `Ok(None)` and finders return empty streams.

use std::fmt;

use authdoc_storage::StorageError;

/// Errors that can occur while reading or writing OAuth entities.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The stored document changed since the entity was loaded.
    #[error("Concurrency conflict on {collection}/{id}: the document was modified or deleted by another writer")]
    Concurrency {
        /// Collection of the conflicting document.
        collection: String,
        /// Key of the conflicting document.
        id: String,
    },

    /// A unique value or document key is already taken.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// A caller-supplied argument is missing or empty.
    #[error("Invalid argument '{name}': {message}")]
    InvalidArgument {
        /// Name of the offending argument.
        name: &'static str,
        /// Why the argument was rejected.
        message: String,
    },

    /// The entity factory failed to produce a blank entity.
    #[error("Failed to instantiate {entity}: {source}")]
    Instantiation {
        /// Entity type name.
        entity: &'static str,
        /// Factory failure.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The operation is deliberately not offered by this store.
    #[error("Operation not supported: {operation}")]
    NotSupported {
        /// Name of the rejected operation.
        operation: &'static str,
    },

    /// The session was cancelled while the operation was in flight.
    #[error("Operation cancelled")]
    Cancelled,

    /// A set-based operation stopped before completing.
    #[error("Bulk operation failed after {completed} documents: {message}")]
    Operation {
        /// Documents processed before the failure.
        completed: u64,
        /// Description of the failure.
        message: String,
    },

    /// A document body could not be converted to or from an entity.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other document store failure.
    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl StoreError {
    /// Creates a new `Concurrency` error.
    #[must_use]
    pub fn concurrency(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Concurrency {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidArgument` error.
    #[must_use]
    pub fn invalid_argument(name: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            message: message.into(),
        }
    }

    /// Creates an `InvalidArgument` error for an empty identifier.
    #[must_use]
    pub fn empty_argument(name: &'static str) -> Self {
        Self::invalid_argument(name, "the value cannot be null or empty")
    }

    /// Creates a new `Instantiation` error.
    #[must_use]
    pub fn instantiation(
        entity: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Instantiation {
            entity,
            source: source.into(),
        }
    }

    /// Creates a new `NotSupported` error.
    #[must_use]
    pub fn not_supported(operation: &'static str) -> Self {
        Self::NotSupported { operation }
    }

    /// Returns `true` if this is an optimistic concurrency failure.
    #[must_use]
    pub fn is_concurrency(&self) -> bool {
        matches!(self, Self::Concurrency { .. })
    }

    /// Returns `true` if a unique value or key was already taken.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns `true` if an argument was rejected.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Returns `true` if the operation is not offered by the store.
    #[must_use]
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported { .. })
    }

    /// Returns `true` if the operation was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Concurrency { .. } | Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::InvalidArgument { .. } => ErrorCategory::Validation,
            Self::NotSupported { .. } => ErrorCategory::Unsupported,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Operation { .. } => ErrorCategory::Operation,
            Self::Instantiation { .. } | Self::Serialization(_) => ErrorCategory::Internal,
            Self::Storage(_) => ErrorCategory::Infrastructure,
        }
    }
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::VersionConflict { collection, id, .. } => {
                Self::Concurrency { collection, id }
            }
            StorageError::AlreadyExists { collection, id } => {
                Self::conflict(format!("a document with key '{id}' already exists in '{collection}'"))
            }
            StorageError::UniqueViolation { key, owner } => {
                Self::conflict(format!("the unique value '{key}' is already held by '{owner}'"))
            }
            StorageError::Cancelled => Self::Cancelled,
            StorageError::OperationFailed {
                completed, message, ..
            } => Self::Operation { completed, message },
            StorageError::Serialization(err) => Self::Serialization(err),
            other => Self::Storage(other),
        }
    }
}

/// Categories of store errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Version or uniqueness conflicts.
    Conflict,
    /// Rejected arguments.
    Validation,
    /// Operations the store does not offer.
    Unsupported,
    /// Cancelled sessions.
    Cancelled,
    /// Failed set-based operations.
    Operation,
    /// Document store failures.
    Infrastructure,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Operation => write!(f, "operation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
