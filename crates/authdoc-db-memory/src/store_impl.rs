//! DocumentStore trait implementation for InMemoryDocumentStore.

use async_trait::async_trait;
use authdoc_storage::{
    BulkOptions, CommitOutcome, DocumentCursor, DocumentQuery, DocumentStore, IndexDefinition,
    IndexStatus, Operation, PatchOperation, StorageResult, StoredDocument, WriteBatch,
};
use tracing::instrument;

use crate::bulk::BulkAction;
use crate::storage::InMemoryDocumentStore;

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn load(&self, collection: &str, id: &str) -> StorageResult<Option<StoredDocument>> {
        Ok(self.inner.load(collection, id))
    }

    #[instrument(skip_all, fields(commands = batch.len()))]
    async fn commit(&self, batch: WriteBatch) -> StorageResult<Vec<CommitOutcome>> {
        self.inner.commit(batch).await
    }

    async fn stream(&self, query: DocumentQuery) -> StorageResult<DocumentCursor> {
        self.inner.open_cursor(query).await
    }

    async fn count(&self, query: DocumentQuery) -> StorageResult<u64> {
        self.inner.count_matches(&query).await
    }

    async fn register_index(&self, definition: IndexDefinition) -> StorageResult<()> {
        self.inner.register_index(definition)
    }

    async fn index_status(&self, name: &str) -> StorageResult<IndexStatus> {
        let index = self.inner.index(name)?;
        Ok(index.status(self.inner.last_etag()))
    }

    async fn delete_by_query(
        &self,
        query: DocumentQuery,
        options: BulkOptions,
    ) -> StorageResult<Operation> {
        self.inner.start_bulk(query, BulkAction::Delete, options)
    }

    async fn patch_by_query(
        &self,
        query: DocumentQuery,
        patch: PatchOperation,
        options: BulkOptions,
    ) -> StorageResult<Operation> {
        self.inner.start_bulk(query, BulkAction::Patch(patch), options)
    }

    fn generate_id(&self, collection: &str) -> String {
        self.inner.generate_id(collection)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
