//! Streaming query results.
//!
//! [`EntityStream`] pulls documents from a store cursor one page at a time
//! and decodes them into entities. The query is only issued on first poll.
//! The cursor is closed when the stream ends, fails, is cancelled or is
//! dropped early.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_stream::stream;
use authdoc_storage::{DocumentQuery, StoredDocument};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use tracing::trace;

use crate::error::StoreError;
use crate::models::Entity;
use crate::session::{self, Session};
use crate::StoreResult;

/// Re-check applied to each decoded entity before it is yielded.
pub type Verify<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Results of a caller-projected query.
pub type QueryStream<R> = BoxStream<'static, StoreResult<R>>;

/// A forward-only stream of entities.
pub struct EntityStream<E> {
    inner: BoxStream<'static, StoreResult<E>>,
}

enum Step {
    Next(StoredDocument),
    Failed(StoreError),
    Cancelled,
    Done,
}

impl<E: Entity> EntityStream<E> {
    pub(crate) fn open(session: Session, query: DocumentQuery, verify: Option<Verify<E>>) -> Self {
        let inner = stream! {
            let cancellation = session.cancellation().clone();
            let mut cursor = match session.run(session.store().stream(query)).await {
                Ok(cursor) => cursor,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };

            loop {
                let step = tokio::select! {
                    biased;
                    () = cancellation.cancelled() => Step::Cancelled,
                    next = cursor.next() => match next {
                        Some(Ok(document)) => Step::Next(document),
                        Some(Err(err)) => Step::Failed(err.into()),
                        None => Step::Done,
                    },
                };

                match step {
                    Step::Next(document) => {
                        let id = document.id.clone();
                        match session::decode::<E>(document) {
                            Ok(entity) => {
                                if verify.as_ref().is_none_or(|verify| verify(&entity)) {
                                    yield Ok(entity);
                                } else {
                                    trace!(id = %id, "Dropping stale index match");
                                }
                            }
                            Err(err) => {
                                cursor.close();
                                yield Err(err);
                                return;
                            }
                        }
                    }
                    Step::Failed(err) => {
                        cursor.close();
                        yield Err(err);
                        return;
                    }
                    Step::Cancelled => {
                        cursor.close();
                        yield Err(StoreError::Cancelled);
                        return;
                    }
                    Step::Done => return,
                }
            }
        };

        Self {
            inner: Box::pin(inner),
        }
    }

    /// A stream that yields nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            inner: stream::empty().boxed(),
        }
    }

    /// Collects every entity, stopping at the first error.
    ///
    /// # Errors
    ///
    /// Returns the first error yielded by the stream.
    pub async fn try_collect_vec(mut self) -> StoreResult<Vec<E>> {
        let mut entities = Vec::new();
        while let Some(entity) = self.next().await {
            entities.push(entity?);
        }
        Ok(entities)
    }

    /// Converts into a boxed stream for projections.
    #[must_use]
    pub fn boxed(self) -> QueryStream<E> {
        self.inner
    }
}

impl<E> Stream for EntityStream<E> {
    type Item = StoreResult<E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl<E> std::fmt::Debug for EntityStream<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStream").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::models::Scope;
    use authdoc_db_memory::InMemoryDocumentStore;
    use authdoc_storage::{WriteBatch, WriteCommand, WriteExpectation};
    use serde_json::json;

    async fn seeded(count: usize) -> (Arc<InMemoryDocumentStore>, Session) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let batch = (1..=count)
            .map(|n| {
                WriteCommand::put(
                    "scopes",
                    format!("scopes/{n}"),
                    json!({ "name": format!("scope-{n}") }),
                    WriteExpectation::Absent,
                )
            })
            .collect::<WriteBatch>();
        authdoc_storage::DocumentStore::commit(store.as_ref(), batch)
            .await
            .unwrap();

        let config = StoreConfig {
            stream_page_size: 2,
            ..StoreConfig::default()
        };
        let session = Session::new(store.clone(), Arc::new(config));
        (store, session)
    }

    #[tokio::test]
    async fn test_query_is_lazy() {
        let (store, session) = seeded(3).await;
        let before = store.queries_executed();

        let stream = session.stream::<Scope>(DocumentQuery::collection("scopes"), None);
        assert_eq!(store.queries_executed(), before);

        let scopes = stream.try_collect_vec().await.unwrap();
        assert_eq!(scopes.len(), 3);
        assert_eq!(store.queries_executed(), before + 1);
        assert_eq!(store.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_verify_filters_matches() {
        let (_, session) = seeded(4).await;
        let verify: Verify<Scope> = Arc::new(|scope| scope.name.as_deref() != Some("scope-2"));
        let names: Vec<String> = session
            .stream::<Scope>(DocumentQuery::collection("scopes"), Some(verify))
            .try_collect_vec()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|scope| scope.name)
            .collect();
        assert_eq!(names.len(), 3);
        assert!(!names.contains(&"scope-2".to_string()));
    }

    #[tokio::test]
    async fn test_cancellation_closes_cursor() {
        let (store, session) = seeded(5).await;
        let mut stream = session.stream::<Scope>(DocumentQuery::collection("scopes"), None);

        assert!(stream.next().await.unwrap().is_ok());
        assert_eq!(store.open_cursors(), 1);

        session.cancel();
        assert!(stream.next().await.unwrap().unwrap_err().is_cancelled());
        assert_eq!(store.open_cursors(), 0);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_early_drop_closes_cursor() {
        let (store, session) = seeded(5).await;
        let mut stream = session.stream::<Scope>(DocumentQuery::collection("scopes"), None);
        assert!(stream.next().await.is_some());
        assert_eq!(store.open_cursors(), 1);

        drop(stream);
        assert_eq!(store.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_document_ends_stream() {
        let (store, session) = seeded(0).await;
        let mut batch = WriteBatch::new();
        batch.push(WriteCommand::put(
            "scopes",
            "scopes/bad",
            json!({ "name": ["not", "a", "string"] }),
            WriteExpectation::Absent,
        ));
        authdoc_storage::DocumentStore::commit(store.as_ref(), batch)
            .await
            .unwrap();

        let mut stream = session.stream::<Scope>(DocumentQuery::collection("scopes"), None);
        assert!(matches!(
            stream.next().await,
            Some(Err(StoreError::Serialization(_)))
        ));
        assert!(stream.next().await.is_none());
        assert_eq!(store.open_cursors(), 0);
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let mut stream = EntityStream::<Scope>::empty();
        assert!(stream.next().await.is_none());
    }
}
