//! Query execution over collection scans and materialized indexes.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use authdoc_storage::{
    DocumentCursor, DocumentQuery, QuerySource, StorageError, StorageResult, StoredDocument,
};
use futures_util::stream::{self, StreamExt};
use tracing::debug;

use crate::storage::StoreInner;

/// Documents selected by a query, before they are loaded.
pub(crate) struct Selection {
    pub(crate) collection: String,
    pub(crate) ids: Vec<String>,
}

impl StoreInner {
    /// Resolves a query to the keys it matches, applying skip and take.
    pub(crate) async fn select(&self, query: &DocumentQuery) -> StorageResult<Selection> {
        query.validate()?;
        self.queries.fetch_add(1, Ordering::SeqCst);

        let (collection, ids) = match &query.source {
            QuerySource::Collection(collection) => {
                (collection.clone(), self.collection_ids(collection))
            }
            QuerySource::Index(name) => {
                let index = self.index(name)?;
                if let Some(timeout) = query.options.wait_for_non_stale {
                    let target = self.last_etag();
                    if tokio::time::timeout(timeout, index.caught_up(target))
                        .await
                        .is_err()
                    {
                        return Err(StorageError::stale_index(name.as_str(), timeout));
                    }
                }
                (
                    index.collection().to_owned(),
                    index.matching(query.filter.as_ref()),
                )
            }
        };

        let ids = ids
            .into_iter()
            .skip(query.skip.unwrap_or(0))
            .take(query.take.unwrap_or(usize::MAX))
            .collect();
        Ok(Selection { collection, ids })
    }

    /// Opens a paged cursor. Documents are loaded a page at a time as the
    /// consumer pulls; keys whose document was deleted since selection are
    /// skipped.
    pub(crate) async fn open_cursor(
        self: &Arc<Self>,
        query: DocumentQuery,
    ) -> StorageResult<DocumentCursor> {
        let Selection { collection, ids } = self.select(&query).await?;
        let page_size = query
            .options
            .page_size
            .unwrap_or(self.options.stream_page_size)
            .max(1);
        debug!(collection = %collection, matches = ids.len(), page_size, "Opening cursor");

        let store = Arc::clone(self);
        let pages = stream::iter(ids)
            .chunks(page_size)
            .flat_map(move |page| {
                let documents: Vec<StorageResult<StoredDocument>> = page
                    .iter()
                    .filter_map(|id| store.load(&collection, id))
                    .map(Ok)
                    .collect();
                stream::iter(documents)
            });

        self.open_cursors.fetch_add(1, Ordering::SeqCst);
        let tracker = Arc::clone(self);
        Ok(DocumentCursor::new(pages.boxed()).on_close(move || {
            tracker.open_cursors.fetch_sub(1, Ordering::SeqCst);
        }))
    }

    pub(crate) async fn count_matches(&self, query: &DocumentQuery) -> StorageResult<u64> {
        let selection = self.select(query).await?;
        Ok(selection.ids.len() as u64)
    }
}
