//! Set-based operations: delete-by-query and patch-by-query.
//!
//! An operation resolves its query once, then commits the matches in batches
//! on a background task. Each batch is atomic; the operation as a whole is
//! not, so a failure reports how many documents were already processed.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use authdoc_storage::{
    BulkOptions, CommitOutcome, DocumentQuery, Operation, OperationResult, PatchOperation,
    PatchStatus, QuerySource, StorageError, StorageResult, WriteBatch, WriteCommand,
    WriteExpectation,
};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::storage::StoreInner;

#[derive(Debug, Clone)]
pub(crate) enum BulkAction {
    Delete,
    Patch(PatchOperation),
}

impl BulkAction {
    fn command(&self, collection: &str, id: &str) -> WriteCommand {
        match self {
            Self::Delete => WriteCommand::delete(collection, id, WriteExpectation::Any),
            Self::Patch(patch) => WriteCommand::patch(collection, id, patch.clone()),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Delete => "delete_by_query",
            Self::Patch(_) => "patch_by_query",
        }
    }
}

impl StoreInner {
    pub(crate) fn start_bulk(
        self: &Arc<Self>,
        query: DocumentQuery,
        action: BulkAction,
        options: BulkOptions,
    ) -> StorageResult<Operation> {
        query.validate()?;
        if let QuerySource::Index(name) = &query.source {
            self.index(name)?;
        }

        let id = self.operations.fetch_add(1, Ordering::SeqCst) + 1;
        let cancellation = CancellationToken::new();
        let (sender, receiver) = oneshot::channel();
        let store = Arc::clone(self);
        let token = cancellation.clone();

        debug!(operation = id, kind = action.name(), "Starting set-based operation");
        tokio::spawn(async move {
            let result = store.run_bulk(id, query, action, options, token).await;
            if let Err(err) = &result {
                warn!(operation = id, error = %err, "Set-based operation failed");
            }
            let _ = sender.send(result);
        });

        Ok(Operation::new(id, receiver, cancellation))
    }

    async fn run_bulk(
        &self,
        id: u64,
        query: DocumentQuery,
        action: BulkAction,
        options: BulkOptions,
        cancellation: CancellationToken,
    ) -> StorageResult<OperationResult> {
        let selection = self
            .select(&query)
            .await
            .map_err(|err| StorageError::operation_failed(id, 0, err.to_string()))?;
        let batch_size = options
            .batch_size
            .unwrap_or(self.options.bulk_batch_size)
            .max(1);

        let mut result = OperationResult {
            operation_id: id,
            ..OperationResult::default()
        };

        for chunk in selection.ids.chunks(batch_size) {
            if cancellation.is_cancelled() {
                return Err(StorageError::operation_failed(
                    id,
                    result.total,
                    "operation was killed",
                ));
            }

            let batch: WriteBatch = chunk
                .iter()
                .map(|doc_id| action.command(&selection.collection, doc_id))
                .collect();
            let outcomes = self
                .commit(batch)
                .await
                .map_err(|err| StorageError::operation_failed(id, result.total, err.to_string()))?;

            for outcome in outcomes {
                let affected = match outcome {
                    CommitOutcome::Deleted {
                        id, existed: true, ..
                    } => Some(id),
                    CommitOutcome::Patched {
                        id,
                        status: PatchStatus::Patched(_),
                        ..
                    } => Some(id),
                    _ => None,
                };
                if let Some(doc_id) = affected {
                    result.total += 1;
                    if options.retrieve_details {
                        result.details.push(doc_id);
                    }
                }
            }

            tokio::task::yield_now().await;
        }

        debug!(operation = id, kind = action.name(), affected = result.total, "Set-based operation completed");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use crate::InMemoryDocumentStore;
    use crate::factory::StorageOptions;
    use authdoc_storage::{
        BulkOptions, DocumentQuery, DocumentStore, Filter, IndexDefinition, IndexEntry,
        PatchOperation, WriteBatch, WriteCommand, WriteExpectation,
    };
    use serde_json::{Value, json};
    use std::time::Duration;

    fn status_index() -> IndexDefinition {
        IndexDefinition::new("TokenIndex", "tokens", |doc, _| {
            let mut entry = IndexEntry::new();
            entry.insert("status".into(), doc.body.get("status").cloned().unwrap_or(Value::Null));
            vec![entry]
        })
    }

    async fn seeded_store(options: StorageOptions) -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::with_options(options);
        store.register_index(status_index()).await.unwrap();
        let batch = (1..=10)
            .map(|n| {
                let status = if n % 2 == 0 { "revoked" } else { "valid" };
                WriteCommand::put(
                    "tokens",
                    format!("tokens/{n:02}"),
                    json!({ "status": status, "tags": ["a"] }),
                    WriteExpectation::Absent,
                )
            })
            .collect::<WriteBatch>();
        store.commit(batch).await.unwrap();
        assert!(store.wait_for_indexing(Duration::from_secs(5)).await);
        store
    }

    #[tokio::test]
    async fn test_delete_by_query_with_details() {
        let store = seeded_store(StorageOptions::default().with_bulk_batch_size(2)).await;
        let operation = store
            .delete_by_query(
                DocumentQuery::index("TokenIndex").with_filter(Filter::eq("status", "revoked")),
                BulkOptions::default().with_details(),
            )
            .await
            .unwrap();
        let result = operation.wait_for_completion().await.unwrap();

        assert_eq!(result.total, 5);
        assert_eq!(
            result.details,
            vec!["tokens/02", "tokens/04", "tokens/06", "tokens/08", "tokens/10"]
        );
        assert_eq!(store.document_count(), 5);
    }

    #[tokio::test]
    async fn test_patch_by_query() {
        let store = seeded_store(StorageOptions::default()).await;
        let result = store
            .patch_by_query(
                DocumentQuery::index("TokenIndex").with_filter(Filter::eq("status", "valid")),
                PatchOperation::remove("tags", "a"),
                BulkOptions::default(),
            )
            .await
            .unwrap()
            .wait_for_completion()
            .await
            .unwrap();

        assert_eq!(result.total, 5);
        assert!(result.details.is_empty());
        let untouched = store.load("tokens", "tokens/02").await.unwrap().unwrap();
        assert_eq!(untouched.body["tags"], json!(["a"]));
        let patched = store.load("tokens", "tokens/01").await.unwrap().unwrap();
        assert_eq!(patched.body["tags"], json!([]));
    }

    #[tokio::test]
    async fn test_unknown_index_is_rejected_up_front() {
        let store = InMemoryDocumentStore::new();
        let err = store
            .delete_by_query(DocumentQuery::index("TokenIndex"), BulkOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_index_not_found());
    }

    #[tokio::test]
    async fn test_killed_operation_reports_progress() {
        let store = seeded_store(StorageOptions::default().with_bulk_batch_size(1)).await;
        let operation = store
            .delete_by_query(DocumentQuery::collection("tokens"), BulkOptions::default())
            .await
            .unwrap();
        operation.kill();

        match operation.wait_for_completion().await {
            Err(authdoc_storage::StorageError::OperationFailed { completed, .. }) => {
                assert!(completed < 10);
                assert_eq!(store.document_count(), 10 - completed as usize);
            }
            Ok(result) => assert_eq!(result.total, 10),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
