//! In-memory document store backend for authdoc.
//!
//! This crate provides an in-memory implementation of the `DocumentStore` trait
//! from `authdoc-storage`, using papaya lock-free HashMap for concurrent access.
//! Secondary indexes are materialized by background tokio tasks, so index reads
//! behave like those of a real document database: eventually consistent.
//!
//! # Example
//!
//! ```ignore
//! use authdoc_db_memory::InMemoryDocumentStore;
//! use authdoc_storage::{DocumentStore, WriteBatch, WriteCommand, WriteExpectation};
//!
//! let store = InMemoryDocumentStore::new();
//!
//! let mut batch = WriteBatch::new();
//! batch.push(WriteCommand::put(
//!     "scopes",
//!     "scopes/1",
//!     serde_json::json!({ "name": "profile" }),
//!     WriteExpectation::Absent,
//! ));
//! store.commit(batch).await?;
//! ```

mod bulk;
pub mod factory;
mod indexing;
mod query;
pub mod storage;
mod store_impl;

// Re-export the DocumentStore trait for convenience
pub use authdoc_storage::{DocumentStore, StorageError, StoredDocument};

pub use factory::{StorageBackend, StorageConfig, StorageOptions, create_document_store};
pub use storage::InMemoryDocumentStore;

/// Creates a new in-memory document store with default options.
pub fn create_memory_store() -> authdoc_storage::DynDocumentStore {
    std::sync::Arc::new(InMemoryDocumentStore::new())
}
