//! The document store driver trait.

use async_trait::async_trait;

use crate::cursor::DocumentCursor;
use crate::index::{IndexDefinition, IndexStatus};
use crate::operation::{BulkOptions, Operation};
use crate::query::DocumentQuery;
use crate::types::{CommitOutcome, PatchOperation, StoredDocument, WriteBatch};
use crate::StorageResult;

/// The contract a document store must fulfil to back the OAuth entity stores.
///
/// Implementations must be thread-safe (`Send + Sync`). Key lookups are
/// strongly consistent; index queries may observe a stale index.
///
/// # Example
///
/// ```ignore
/// use authdoc_storage::{DocumentStore, StorageResult, WriteBatch, WriteCommand, WriteExpectation};
/// use serde_json::json;
///
/// async fn rename(store: &dyn DocumentStore, id: &str) -> StorageResult<()> {
///     let Some(current) = store.load("scopes", id).await? else {
///         return Ok(());
///     };
///     let mut body = current.body;
///     body["displayName"] = json!("Profile");
///
///     let mut batch = WriteBatch::new();
///     batch.push(WriteCommand::put(
///         "scopes",
///         id,
///         body,
///         WriteExpectation::Version(current.change_vector),
///     ));
///     store.commit(batch).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // ==================== Key-value access ====================

    /// Loads a document by key.
    ///
    /// Returns `None` if the document does not exist in `collection`.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing documents.
    async fn load(&self, collection: &str, id: &str) -> StorageResult<Option<StoredDocument>>;

    /// Commits a batch atomically.
    ///
    /// Every expectation and unique reservation is checked before anything is
    /// applied; a failing check rejects the whole batch. Outcomes are returned
    /// in command order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::VersionConflict` for a stale version expectation.
    /// Returns `StorageError::AlreadyExists` when an absent key is taken.
    /// Returns `StorageError::UniqueViolation` when a reserved value is held elsewhere.
    async fn commit(&self, batch: WriteBatch) -> StorageResult<Vec<CommitOutcome>>;

    // ==================== Queries ====================

    /// Opens a cursor over the documents matched by `query`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidQuery` for malformed queries.
    /// Returns `StorageError::IndexNotFound` for unknown indexes.
    /// Returns `StorageError::StaleIndex` if waiting for a non-stale index times out.
    async fn stream(&self, query: DocumentQuery) -> StorageResult<DocumentCursor>;

    /// Counts the documents matched by `query`.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentStore::stream`].
    async fn count(&self, query: DocumentQuery) -> StorageResult<u64>;

    // ==================== Indexes ====================

    /// Registers a secondary index. Registering an existing name is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error for infrastructure issues.
    async fn register_index(&self, definition: IndexDefinition) -> StorageResult<()>;

    /// Reports materialization progress of an index.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::IndexNotFound` for unknown indexes.
    async fn index_status(&self, name: &str) -> StorageResult<IndexStatus>;

    // ==================== Set-based operations ====================

    /// Starts deleting every document matched by `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation cannot be started. Failures while it
    /// runs are reported by [`Operation::wait_for_completion`].
    async fn delete_by_query(
        &self,
        query: DocumentQuery,
        options: BulkOptions,
    ) -> StorageResult<Operation>;

    /// Starts applying `patch` to every document matched by `query`.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentStore::delete_by_query`].
    async fn patch_by_query(
        &self,
        query: DocumentQuery,
        patch: PatchOperation,
        options: BulkOptions,
    ) -> StorageResult<Operation>;

    // ==================== Metadata ====================

    /// Generates a fresh key for a new document in `collection`.
    fn generate_id(&self, collection: &str) -> String;

    /// Returns the name of the backend, for logging.
    fn backend_name(&self) -> &'static str;
}
