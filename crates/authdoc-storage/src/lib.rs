//! # authdoc-storage
//!
//! Document store driver contract for the authdoc persistence layer.
//!
//! This crate defines the traits and types a document store must provide so the
//! OAuth entity stores in `authdoc-oauth` can run on top of it. It does not
//! contain any implementations - those are provided by separate crates.
//!
//! ## Overview
//!
//! The main trait is [`DocumentStore`], which defines the contract for:
//! - Key-value access (`load`) and atomic write batches (`commit`)
//! - Optimistic version checks through [`WriteExpectation`]
//! - Atomic field patches ([`PatchOperation`])
//! - Asynchronously materialized secondary indexes ([`IndexDefinition`])
//! - Streaming queries over a collection or an index ([`DocumentCursor`])
//! - Set-based operations (`delete_by_query`, `patch_by_query`)
//!
//! ## Example
//!
//! ```ignore
//! use authdoc_storage::{DocumentQuery, DocumentStore, Filter, StorageResult};
//! use futures_util::StreamExt;
//!
//! async fn client_ids(store: &dyn DocumentStore) -> StorageResult<Vec<String>> {
//!     let query = DocumentQuery::index("ApplicationIndex")
//!         .with_filter(Filter::eq("clientId", "portal"));
//!
//!     let mut cursor = store.stream(query).await?;
//!     let mut ids = Vec::new();
//!     while let Some(document) = cursor.next().await {
//!         ids.push(document?.id);
//!     }
//!     Ok(ids)
//! }
//! ```

mod cursor;
mod error;
mod index;
mod operation;
mod query;
mod traits;
mod types;

pub use cursor::DocumentCursor;
pub use error::{ErrorCategory, StorageError};
pub use index::{DocumentLoader, IndexDefinition, IndexEntry, IndexStatus};
pub use operation::{BulkOptions, Operation, OperationResult};
pub use query::{DocumentQuery, Filter, QueryOptions, QuerySource};
pub use traits::DocumentStore;
pub use types::{
    ChangeVector, CommitOutcome, DocumentMetadata, PatchOperation, PatchStatus, StoredDocument,
    UniqueConstraint, WriteBatch, WriteCommand, WriteExpectation,
};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared document store trait object.
pub type DynDocumentStore = std::sync::Arc<dyn DocumentStore>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use authdoc_storage::prelude::*;
/// ```
pub mod prelude {
    pub use crate::cursor::DocumentCursor;
    pub use crate::error::{ErrorCategory, StorageError};
    pub use crate::index::{DocumentLoader, IndexDefinition, IndexEntry, IndexStatus};
    pub use crate::operation::{BulkOptions, Operation, OperationResult};
    pub use crate::query::{DocumentQuery, Filter, QueryOptions, QuerySource};
    pub use crate::traits::DocumentStore;
    pub use crate::types::{
        ChangeVector, CommitOutcome, DocumentMetadata, PatchOperation, PatchStatus,
        StoredDocument, UniqueConstraint, WriteBatch, WriteCommand, WriteExpectation,
    };
    pub use crate::{DynDocumentStore, StorageResult};
}
