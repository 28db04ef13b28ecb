//! Background materialization of secondary indexes.
//!
//! Each registered index owns a worker task. The worker waits for commits,
//! replays the change log since the etag it last processed and recomputes the
//! entries of every affected document. A document is affected when it belongs
//! to the indexed collection or when its previous entries loaded the changed
//! document through the [`DocumentLoader`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use authdoc_storage::{
    DocumentLoader, Filter, IndexDefinition, IndexEntry, IndexStatus, StorageResult,
};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, trace};

use crate::storage::{Change, StoreInner};

pub(crate) struct MaterializedIndex {
    definition: IndexDefinition,
    state: RwLock<IndexState>,
    /// Etag of the latest write reflected in `state`
    indexed: watch::Sender<u64>,
}

#[derive(Default)]
struct IndexState {
    /// Source document key -> entries
    entries: BTreeMap<String, Vec<IndexEntry>>,
    /// Loaded document key -> source documents that loaded it
    references: HashMap<String, HashSet<String>>,
    /// Source document key -> documents it loaded
    loads: HashMap<String, HashSet<String>>,
}

impl MaterializedIndex {
    fn new(definition: IndexDefinition) -> Arc<Self> {
        let (indexed, _) = watch::channel(0);
        Arc::new(Self {
            definition,
            state: RwLock::new(IndexState::default()),
            indexed,
        })
    }

    pub(crate) fn name(&self) -> &str {
        self.definition.name()
    }

    pub(crate) fn collection(&self) -> &str {
        self.definition.collection()
    }

    pub(crate) fn indexed_etag(&self) -> u64 {
        *self.indexed.borrow()
    }

    pub(crate) fn status(&self, last_etag: u64) -> IndexStatus {
        let entries = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len();
        IndexStatus {
            name: self.name().to_owned(),
            is_stale: self.indexed_etag() < last_etag,
            entries,
        }
    }

    /// Keys of source documents with at least one entry matching `filter`.
    pub(crate) fn matching(&self, filter: Option<&Filter>) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .entries
            .iter()
            .filter(|(_, entries)| {
                filter.is_none_or(|filter| entries.iter().any(|entry| filter.matches(entry)))
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Resolves once the index has processed every write up to `etag`.
    pub(crate) async fn caught_up(&self, etag: u64) {
        let mut indexed = self.indexed.subscribe();
        let _ = indexed.wait_for(|current| *current >= etag).await;
    }

    fn rebuild(&self, store: &StoreInner, etag: u64) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = IndexState::default();
        let ids = store.collection_ids(self.collection());
        for id in &ids {
            self.reindex(&mut state, store, id);
        }
        drop(state);
        self.indexed.send_replace(etag);
        debug!(index = %self.name(), documents = ids.len(), etag, "Index built");
    }

    fn catch_up(&self, store: &StoreInner, changes: &[Change], etag: u64) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut affected = BTreeSet::new();
        for change in changes {
            if change.collection == self.collection() {
                affected.insert(change.id.clone());
            }
            if let Some(sources) = state.references.get(&change.id) {
                affected.extend(sources.iter().cloned());
            }
        }
        for id in &affected {
            self.reindex(&mut state, store, id);
        }
        drop(state);
        self.indexed.send_replace(etag);
        trace!(index = %self.name(), documents = affected.len(), etag, "Index caught up");
    }

    fn reindex(&self, state: &mut IndexState, store: &StoreInner, source: &str) {
        state.entries.remove(source);
        if let Some(loaded) = state.loads.remove(source) {
            for reference in loaded {
                if let Some(sources) = state.references.get_mut(&reference) {
                    sources.remove(source);
                    if sources.is_empty() {
                        state.references.remove(&reference);
                    }
                }
            }
        }

        let Some(document) = store.load(self.collection(), source) else {
            return;
        };
        let mut loader = RecordingLoader {
            store,
            loaded: HashSet::new(),
        };
        let entries = self.definition.map(&document, &mut loader);

        for reference in &loader.loaded {
            state
                .references
                .entry(reference.clone())
                .or_default()
                .insert(source.to_owned());
        }
        if !loader.loaded.is_empty() {
            state.loads.insert(source.to_owned(), loader.loaded);
        }
        if !entries.is_empty() {
            state.entries.insert(source.to_owned(), entries);
        }
    }
}

struct RecordingLoader<'a> {
    store: &'a StoreInner,
    loaded: HashSet<String>,
}

impl DocumentLoader for RecordingLoader<'_> {
    fn load(&mut self, collection: &str, id: &str) -> Option<Value> {
        self.loaded.insert(id.to_owned());
        self.store.load(collection, id).map(|document| document.body)
    }
}

impl StoreInner {
    pub(crate) fn register_index(self: &Arc<Self>, definition: IndexDefinition) -> StorageResult<()> {
        let index = {
            let mut indexes = self.indexes.write().unwrap_or_else(PoisonError::into_inner);
            if indexes.contains_key(definition.name()) {
                debug!(index = %definition.name(), "Index already registered");
                return Ok(());
            }
            let index = MaterializedIndex::new(definition);
            indexes.insert(index.name().to_owned(), Arc::clone(&index));
            index
        };

        info!(index = %index.name(), collection = %index.collection(), "Registered index");
        spawn_worker(
            Arc::downgrade(self),
            index,
            self.committed.subscribe(),
            self.options.indexing_delay,
        );
        Ok(())
    }

    async fn rebuild_index(&self, index: &MaterializedIndex) {
        let _commit = self.commit_lock.lock().await;
        index.rebuild(self, self.last_etag());
    }

    fn index_pending(&self, index: &MaterializedIndex) {
        let from = index.indexed_etag();
        let upto = self.last_etag();
        if upto <= from {
            return;
        }
        let changes = self.changes_between(from, upto);
        index.catch_up(self, &changes, upto);
        self.compact_changes();
    }
}

fn spawn_worker(
    store: Weak<StoreInner>,
    index: Arc<MaterializedIndex>,
    mut committed: watch::Receiver<u64>,
    delay: Option<Duration>,
) {
    tokio::spawn(async move {
        let mut built = false;
        loop {
            let target = *committed.borrow_and_update();
            if !built || target > index.indexed_etag() {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                let Some(store) = store.upgrade() else {
                    break;
                };
                if built {
                    store.index_pending(&index);
                } else {
                    store.rebuild_index(&index).await;
                    built = true;
                }
            }
            if committed.changed().await.is_err() {
                break;
            }
        }
        debug!(index = %index.name(), "Index worker stopped");
    });
}
