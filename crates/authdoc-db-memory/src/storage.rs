use crate::factory::StorageOptions;
use crate::indexing::MaterializedIndex;
use authdoc_storage::{
    ChangeVector, CommitOutcome, DocumentMetadata, PatchStatus, StorageError, StorageResult,
    StoredDocument, WriteBatch, WriteCommand, WriteExpectation,
};
use papaya::HashMap as PapayaHashMap;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::{Mutex, watch};
use tracing::{debug, trace};
use uuid::Uuid;

/// A stored document together with its bookkeeping.
#[derive(Debug)]
pub(crate) struct DocumentRecord {
    pub(crate) collection: String,
    pub(crate) body: Value,
    pub(crate) change_vector: ChangeVector,
    pub(crate) metadata: DocumentMetadata,
    pub(crate) last_modified: OffsetDateTime,
    /// Reservation keys held by this document.
    pub(crate) unique: Vec<String>,
}

impl DocumentRecord {
    pub(crate) fn to_stored(&self, id: &str) -> StoredDocument {
        StoredDocument {
            id: id.to_owned(),
            collection: self.collection.clone(),
            change_vector: self.change_vector.clone(),
            body: self.body.clone(),
            metadata: self.metadata.clone(),
            last_modified: self.last_modified,
        }
    }
}

/// A document write, as seen by index workers.
#[derive(Debug, Clone)]
pub(crate) struct Change {
    pub(crate) collection: String,
    pub(crate) id: String,
}

/// In-memory document store using papaya lock-free HashMap.
///
/// This store provides:
/// - Lock-free reads via papaya::HashMap
/// - Atomic write batches with version checks and unique reservations
/// - Secondary indexes materialized by background tasks
/// - Paged streaming cursors and set-based operations
pub struct InMemoryDocumentStore {
    pub(crate) inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    /// Documents by key
    pub(crate) documents: PapayaHashMap<String, Arc<DocumentRecord>>,
    /// Unique reservation key -> owning document key
    reservations: PapayaHashMap<String, String>,
    /// Etag of the latest committed write
    last_etag: AtomicU64,
    /// Serializes commits so a batch validates and applies as one step
    pub(crate) commit_lock: Mutex<()>,
    /// Writes not yet processed by every index, keyed by etag
    changes: RwLock<BTreeMap<u64, Change>>,
    /// Broadcasts the latest committed etag to index workers
    pub(crate) committed: watch::Sender<u64>,
    pub(crate) indexes: RwLock<HashMap<String, Arc<MaterializedIndex>>>,
    pub(crate) open_cursors: AtomicUsize,
    pub(crate) queries: AtomicU64,
    pub(crate) operations: AtomicU64,
    database_id: String,
    pub(crate) options: StorageOptions,
}

#[derive(Default)]
struct Staging {
    documents: HashMap<String, Option<Arc<DocumentRecord>>>,
    claims: HashMap<String, Option<String>>,
    changes: Vec<(u64, Change)>,
    outcomes: Vec<CommitOutcome>,
}

impl Staging {
    fn record_change(&mut self, etag: u64, collection: &str, id: &str) {
        self.changes.push((
            etag,
            Change {
                collection: collection.to_owned(),
                id: id.to_owned(),
            },
        ));
    }
}

impl InMemoryDocumentStore {
    /// Creates a new in-memory store with default options.
    pub fn new() -> Self {
        Self::with_options(StorageOptions::default())
    }

    /// Creates a new in-memory store with the given options.
    pub fn with_options(options: StorageOptions) -> Self {
        let (committed, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                documents: PapayaHashMap::new(),
                reservations: PapayaHashMap::new(),
                last_etag: AtomicU64::new(0),
                commit_lock: Mutex::new(()),
                changes: RwLock::new(BTreeMap::new()),
                committed,
                indexes: RwLock::new(HashMap::new()),
                open_cursors: AtomicUsize::new(0),
                queries: AtomicU64::new(0),
                operations: AtomicU64::new(0),
                database_id: Uuid::new_v4().simple().to_string(),
                options,
            }),
        }
    }

    /// Returns the number of stored documents across all collections.
    pub fn document_count(&self) -> usize {
        self.inner.documents.pin().len()
    }

    /// Returns the number of cursors that have not been closed yet.
    pub fn open_cursors(&self) -> usize {
        self.inner.open_cursors.load(Ordering::SeqCst)
    }

    /// Returns how many queries the store has executed.
    pub fn queries_executed(&self) -> u64 {
        self.inner.queries.load(Ordering::SeqCst)
    }

    /// Returns the etag of the latest committed write.
    pub fn last_etag(&self) -> u64 {
        self.inner.last_etag()
    }

    /// Waits until every registered index has processed all writes committed
    /// so far. Returns `false` on timeout.
    pub async fn wait_for_indexing(&self, timeout: Duration) -> bool {
        let target = self.inner.last_etag();
        let indexes = self.inner.all_indexes();
        tokio::time::timeout(timeout, async {
            for index in indexes {
                index.caught_up(target).await;
            }
        })
        .await
        .is_ok()
    }

    /// Deletes every document whose expiration hint is at or before `now`.
    ///
    /// Returns the number of documents removed. The store never calls this on
    /// its own.
    pub async fn purge_expired(&self, now: OffsetDateTime) -> StorageResult<usize> {
        let batch = self.inner.expired_batch(now);
        if batch.is_empty() {
            return Ok(0);
        }
        let outcomes = self.inner.commit(batch).await?;
        let purged = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, CommitOutcome::Deleted { existed: true, .. }))
            .count();
        debug!(purged, "Purged expired documents");
        Ok(purged)
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryDocumentStore")
            .field("documents", &self.document_count())
            .field("last_etag", &self.last_etag())
            .finish_non_exhaustive()
    }
}

impl StoreInner {
    pub(crate) fn last_etag(&self) -> u64 {
        self.last_etag.load(Ordering::Acquire)
    }

    pub(crate) fn generate_id(&self, collection: &str) -> String {
        format!("{collection}/{}", Uuid::new_v4())
    }

    fn change_vector(&self, etag: u64) -> ChangeVector {
        ChangeVector::new(format!("A:{etag}-{}", self.database_id))
    }

    pub(crate) fn load(&self, collection: &str, id: &str) -> Option<StoredDocument> {
        let guard = self.documents.pin();
        guard
            .get(id)
            .filter(|record| record.collection == collection)
            .map(|record| record.to_stored(id))
    }

    /// Keys of every document in `collection`, in key order.
    pub(crate) fn collection_ids(&self, collection: &str) -> Vec<String> {
        let guard = self.documents.pin();
        let mut ids: Vec<String> = guard
            .iter()
            .filter(|(_, record)| record.collection == collection)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub(crate) fn index(&self, name: &str) -> StorageResult<Arc<MaterializedIndex>> {
        self.indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::index_not_found(name))
    }

    pub(crate) fn all_indexes(&self) -> Vec<Arc<MaterializedIndex>> {
        self.indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn has_indexes(&self) -> bool {
        !self
            .indexes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Logged writes with `after < etag <= upto`.
    pub(crate) fn changes_between(&self, after: u64, upto: u64) -> Vec<Change> {
        self.changes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .range(after + 1..=upto)
            .map(|(_, change)| change.clone())
            .collect()
    }

    /// Drops log entries every index has already processed.
    pub(crate) fn compact_changes(&self) {
        let floor = self
            .all_indexes()
            .iter()
            .map(|index| index.indexed_etag())
            .min()
            .unwrap_or_else(|| self.last_etag());
        let mut log = self.changes.write().unwrap_or_else(PoisonError::into_inner);
        *log = log.split_off(&(floor + 1));
    }

    fn current(&self, staging: &Staging, id: &str) -> Option<Arc<DocumentRecord>> {
        match staging.documents.get(id) {
            Some(staged) => staged.clone(),
            None => self.documents.pin().get(id).cloned(),
        }
    }

    fn reservation_owner(&self, staging: &Staging, key: &str) -> Option<String> {
        match staging.claims.get(key) {
            Some(owner) => owner.clone(),
            None => self.reservations.pin().get(key).cloned(),
        }
    }

    fn expired_batch(&self, now: OffsetDateTime) -> WriteBatch {
        let guard = self.documents.pin();
        guard
            .iter()
            .filter(|(_, record)| record.metadata.expires.is_some_and(|at| at <= now))
            .map(|(id, record)| {
                WriteCommand::delete(record.collection.clone(), id.clone(), WriteExpectation::Any)
            })
            .collect()
    }

    /// Validates and applies a batch. Nothing is applied unless every command
    /// passes its checks.
    pub(crate) async fn commit(&self, batch: WriteBatch) -> StorageResult<Vec<CommitOutcome>> {
        let _commit = self.commit_lock.lock().await;
        let mut etag = self.last_etag();
        let mut staging = Staging::default();
        let now = OffsetDateTime::now_utc();

        for command in batch.into_commands() {
            match command {
                WriteCommand::Put {
                    collection,
                    id,
                    body,
                    expectation,
                    metadata,
                    unique,
                } => {
                    let current = self.current(&staging, &id);
                    if let Some(existing) = current.as_deref()
                        && existing.collection != collection
                    {
                        return Err(StorageError::already_exists(collection, id));
                    }
                    check_expectation(&collection, &id, current.as_deref(), &expectation)?;

                    let keys: Vec<String> = unique.into_iter().map(|c| c.key).collect();
                    for key in &keys {
                        if let Some(owner) = self.reservation_owner(&staging, key)
                            && owner != id
                        {
                            return Err(StorageError::unique_violation(key.as_str(), owner));
                        }
                    }
                    if let Some(existing) = current.as_deref() {
                        for released in existing.unique.iter().filter(|k| !keys.contains(k)) {
                            staging.claims.insert(released.clone(), None);
                        }
                    }
                    for key in &keys {
                        staging.claims.insert(key.clone(), Some(id.clone()));
                    }

                    etag += 1;
                    let change_vector = self.change_vector(etag);
                    staging.record_change(etag, &collection, &id);
                    staging.outcomes.push(CommitOutcome::Stored {
                        collection: collection.clone(),
                        id: id.clone(),
                        change_vector: change_vector.clone(),
                    });
                    staging.documents.insert(
                        id,
                        Some(Arc::new(DocumentRecord {
                            collection,
                            body,
                            change_vector,
                            metadata,
                            last_modified: now,
                            unique: keys,
                        })),
                    );
                }
                WriteCommand::Delete {
                    collection,
                    id,
                    expectation,
                } => {
                    let current = self
                        .current(&staging, &id)
                        .filter(|record| record.collection == collection);
                    check_expectation(&collection, &id, current.as_deref(), &expectation)?;

                    let existed = current.is_some();
                    if let Some(existing) = current {
                        for key in &existing.unique {
                            staging.claims.insert(key.clone(), None);
                        }
                        etag += 1;
                        staging.record_change(etag, &collection, &id);
                        staging.documents.insert(id.clone(), None);
                    }
                    staging.outcomes.push(CommitOutcome::Deleted {
                        collection,
                        id,
                        existed,
                    });
                }
                WriteCommand::Patch {
                    collection,
                    id,
                    patch,
                } => {
                    let current = self
                        .current(&staging, &id)
                        .filter(|record| record.collection == collection);
                    let status = match current {
                        None => PatchStatus::DocumentDoesNotExist,
                        Some(existing) => {
                            let mut body = existing.body.clone();
                            if patch.apply(&mut body) {
                                etag += 1;
                                let change_vector = self.change_vector(etag);
                                staging.record_change(etag, &collection, &id);
                                staging.documents.insert(
                                    id.clone(),
                                    Some(Arc::new(DocumentRecord {
                                        collection: existing.collection.clone(),
                                        body,
                                        change_vector: change_vector.clone(),
                                        metadata: existing.metadata.clone(),
                                        last_modified: now,
                                        unique: existing.unique.clone(),
                                    })),
                                );
                                PatchStatus::Patched(change_vector)
                            } else {
                                PatchStatus::NotModified
                            }
                        }
                    };
                    trace!(collection = %collection, id = %id, field = patch.field(), ?status, "Patch staged");
                    staging.outcomes.push(CommitOutcome::Patched {
                        collection,
                        id,
                        status,
                    });
                }
            }
        }

        let outcomes = std::mem::take(&mut staging.outcomes);
        self.apply(staging, etag);
        Ok(outcomes)
    }

    fn apply(&self, staging: Staging, etag: u64) {
        {
            let documents = self.documents.pin();
            for (id, record) in staging.documents {
                match record {
                    Some(record) => {
                        documents.insert(id, record);
                    }
                    None => {
                        documents.remove(&id);
                    }
                }
            }
        }
        {
            let reservations = self.reservations.pin();
            for (key, owner) in staging.claims {
                match owner {
                    Some(owner) => {
                        reservations.insert(key, owner);
                    }
                    None => {
                        reservations.remove(&key);
                    }
                }
            }
        }
        if !staging.changes.is_empty() && self.has_indexes() {
            let mut log = self.changes.write().unwrap_or_else(PoisonError::into_inner);
            log.extend(staging.changes);
        }
        self.last_etag.store(etag, Ordering::Release);
        self.committed.send_replace(etag);
    }
}

fn check_expectation(
    collection: &str,
    id: &str,
    current: Option<&DocumentRecord>,
    expectation: &WriteExpectation,
) -> StorageResult<()> {
    match (expectation, current) {
        (WriteExpectation::Any, _) | (WriteExpectation::Absent, None) => Ok(()),
        (WriteExpectation::Absent, Some(_)) => Err(StorageError::already_exists(collection, id)),
        (WriteExpectation::Version(expected), Some(existing)) => {
            if &existing.change_vector == expected {
                Ok(())
            } else {
                Err(StorageError::version_conflict(
                    collection,
                    id,
                    expected.as_str(),
                    existing.change_vector.as_str(),
                ))
            }
        }
        (WriteExpectation::Version(expected), None) => Err(StorageError::version_conflict(
            collection,
            id,
            expected.as_str(),
            "<deleted>",
        )),
    }
}
