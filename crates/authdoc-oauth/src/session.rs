//! Unit of work over a document store.
//!
//! A [`Session`] is opened per request. It buffers write commands, commits
//! them as one atomic batch and races every store call against its
//! cancellation token. Sessions are cheap to clone; clones share the buffer
//! and the token.

use std::future::Future;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use authdoc_storage::{
    CommitOutcome, DocumentQuery, DynDocumentStore, StorageResult, StoredDocument, WriteBatch,
    WriteCommand,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::config::StoreConfig;
use crate::document::{
    DocumentApplicationStore, DocumentAuthorizationStore, DocumentScopeStore, DocumentTokenStore,
};
use crate::error::StoreError;
use crate::models::{Document, Entity};
use crate::stream::{EntityStream, Verify};
use crate::StoreResult;

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    store: DynDocumentStore,
    config: Arc<StoreConfig>,
    pending: Mutex<WriteBatch>,
    cancellation: CancellationToken,
}

impl Session {
    /// Opens a session that is never cancelled from outside.
    #[must_use]
    pub fn new(store: DynDocumentStore, config: Arc<StoreConfig>) -> Self {
        Self::with_cancellation(store, config, CancellationToken::new())
    }

    /// Opens a session bound to `cancellation`.
    #[must_use]
    pub fn with_cancellation(
        store: DynDocumentStore,
        config: Arc<StoreConfig>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                store,
                config,
                pending: Mutex::new(WriteBatch::new()),
                cancellation,
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &DynDocumentStore {
        &self.inner.store
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.inner.cancellation
    }

    /// Cancels every in-flight and future operation of this session.
    pub fn cancel(&self) {
        self.inner.cancellation.cancel();
    }

    /// Defers a command until the next commit.
    pub fn enqueue(&self, command: WriteCommand) {
        self.pending().push(command);
    }

    /// Number of deferred commands.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.pending().len()
    }

    /// Commits every deferred command as one atomic batch.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Concurrency` or `StoreError::Conflict` when a
    /// version check or unique reservation fails; nothing is applied then.
    /// Returns `StoreError::Cancelled` if the session is cancelled first.
    pub async fn save_changes(&self) -> StoreResult<Vec<CommitOutcome>> {
        self.commit(Vec::new()).await
    }

    /// Commits the deferred commands followed by `commands` as one batch.
    /// The buffer is drained whether or not the commit succeeds.
    #[instrument(skip_all, fields(backend = self.inner.store.backend_name()))]
    pub(crate) async fn commit(&self, commands: Vec<WriteCommand>) -> StoreResult<Vec<CommitOutcome>> {
        let batch = {
            let mut pending = self.pending();
            let mut batch = mem::take(&mut *pending);
            for command in commands {
                batch.push(command);
            }
            batch
        };
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let size = batch.len();
        let outcomes = self.run(self.inner.store.commit(batch)).await?;
        debug!(commands = size, "Committed batch");
        Ok(outcomes)
    }

    /// Runs a store call unless the session is cancelled first.
    pub(crate) async fn run<T, F>(&self, call: F) -> StoreResult<T>
    where
        F: Future<Output = StorageResult<T>>,
    {
        tokio::select! {
            biased;
            () = self.inner.cancellation.cancelled() => Err(StoreError::Cancelled),
            result = call => result.map_err(StoreError::from),
        }
    }

    /// Loads and decodes one entity by key.
    pub(crate) async fn load<E: Entity>(&self, id: &str) -> StoreResult<Option<E>> {
        let collection = <E::Model as Document>::COLLECTION;
        self.run(self.inner.store.load(collection, id))
            .await?
            .map(decode)
            .transpose()
    }

    /// Streams the documents matched by `query` as entities.
    pub(crate) fn stream<E: Entity>(
        &self,
        query: DocumentQuery,
        verify: Option<Verify<E>>,
    ) -> EntityStream<E> {
        let query = query.with_page_size(self.inner.config.stream_page_size);
        EntityStream::open(self.clone(), query, verify)
    }

    pub fn applications(&self) -> DocumentApplicationStore {
        DocumentApplicationStore::new(self.clone())
    }

    pub fn authorizations(&self) -> DocumentAuthorizationStore {
        DocumentAuthorizationStore::new(self.clone())
    }

    pub fn scopes(&self) -> DocumentScopeStore {
        DocumentScopeStore::new(self.clone())
    }

    pub fn tokens(&self) -> DocumentTokenStore {
        DocumentTokenStore::new(self.clone())
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, WriteBatch> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.inner.store.backend_name())
            .field("pending", &self.pending_commands())
            .field("cancelled", &self.inner.cancellation.is_cancelled())
            .finish()
    }
}

/// Decodes a stored document, stamping its key and version.
pub(crate) fn decode<E: Entity>(document: StoredDocument) -> StoreResult<E> {
    let StoredDocument {
        id,
        change_vector,
        body,
        ..
    } = document;
    let mut entity: E = serde_json::from_value(body)?;
    let model = entity.model_mut();
    model.set_id(id);
    model.mark_persisted(change_vector);
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Scope;
    use authdoc_db_memory::InMemoryDocumentStore;
    use authdoc_storage::WriteExpectation;
    use serde_json::json;

    fn session() -> Session {
        Session::new(
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(StoreConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_save_changes_commits_deferred_commands() {
        let session = session();
        session.enqueue(WriteCommand::put(
            "scopes",
            "scopes/1",
            json!({ "name": "profile" }),
            WriteExpectation::Absent,
        ));
        assert_eq!(session.pending_commands(), 1);

        let outcomes = session.save_changes().await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(session.pending_commands(), 0);

        let scope: Scope = session.load("scopes/1").await.unwrap().unwrap();
        assert_eq!(scope.name.as_deref(), Some("profile"));
        assert_eq!(scope.id.as_deref(), Some("scopes/1"));
        assert!(scope.change_vector().is_some());
    }

    #[tokio::test]
    async fn test_empty_save_is_a_no_op() {
        assert!(session().save_changes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_session_rejects_calls() {
        let session = session();
        session.cancel();
        let err = session.load::<Scope>("scopes/1").await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_failed_commit_drains_the_buffer() {
        let session = session();
        let put = || {
            WriteCommand::put(
                "scopes",
                "scopes/1",
                json!({ "name": "profile" }),
                WriteExpectation::Absent,
            )
        };
        tokio_test::block_on(async {
            session.enqueue(put());
            session.save_changes().await.unwrap();

            session.enqueue(put());
            let err = session.save_changes().await.unwrap_err();
            assert!(err.is_conflict());
            assert_eq!(session.pending_commands(), 0);
        });
    }
}
