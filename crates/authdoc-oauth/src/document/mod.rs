//! Entity stores backed by a [`DocumentStore`](authdoc_storage::DocumentStore).
//!
//! Each store wraps a [`DocumentCollection`] holding the mechanics shared by
//! all entity kinds: key assignment, versioned writes, collection scans and
//! index queries with match re-checking.

mod application;
mod authorization;
mod scope;
mod token;

pub use application::DocumentApplicationStore;
pub use authorization::DocumentAuthorizationStore;
pub use scope::DocumentScopeStore;
pub use token::DocumentTokenStore;

use std::error::Error;
use std::sync::Arc;

use authdoc_storage::{DocumentMetadata, DocumentQuery, Filter, IndexEntry, WriteCommand, WriteExpectation};
use futures_util::StreamExt;
use tracing::debug;

use crate::StoreResult;
use crate::concurrency;
use crate::error::StoreError;
use crate::models::{Document, Entity};
use crate::session::Session;
use crate::storage::require;
use crate::stream::{EntityStream, QueryStream, Verify};

/// Builds blank entities for `instantiate`.
pub type EntityFactory<E> =
    Arc<dyn Fn() -> Result<E, Box<dyn Error + Send + Sync>> + Send + Sync>;

/// Projects a base model onto the entry its index would hold.
pub(crate) type Projection<M> = fn(&M) -> IndexEntry;

pub(crate) struct DocumentCollection<E: Entity> {
    session: Session,
    factory: EntityFactory<E>,
}

impl<E: Entity> DocumentCollection<E> {
    pub(crate) fn new(session: Session, factory: EntityFactory<E>) -> Self {
        Self { session, factory }
    }

    fn name() -> &'static str {
        <E::Model as Document>::COLLECTION
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) async fn count(&self) -> StoreResult<u64> {
        let query = DocumentQuery::collection(Self::name());
        self.session.run(self.session.store().count(query)).await
    }

    /// Every stored entity, in the store's default order.
    pub(crate) fn scan(&self) -> EntityStream<E> {
        self.session
            .stream(DocumentQuery::collection(Self::name()), None)
    }

    pub(crate) async fn count_with<R, F>(&self, query: F) -> StoreResult<u64>
    where
        F: FnOnce(EntityStream<E>) -> QueryStream<R>,
    {
        let mut results = query(self.scan());
        let mut count = 0;
        while let Some(result) = results.next().await {
            result?;
            count += 1;
        }
        Ok(count)
    }

    pub(crate) async fn get_with<S, R, F>(&self, state: S, query: F) -> StoreResult<Option<R>>
    where
        F: FnOnce(EntityStream<E>, S) -> QueryStream<R>,
    {
        query(self.scan(), state).next().await.transpose()
    }

    pub(crate) fn list(&self, count: Option<usize>, offset: Option<usize>) -> EntityStream<E> {
        let query = DocumentQuery::collection(Self::name())
            .skip(offset)
            .take(count);
        self.session.stream(query, None)
    }

    pub(crate) fn list_with<S, R, F>(&self, state: S, query: F) -> QueryStream<R>
    where
        F: FnOnce(EntityStream<E>, S) -> QueryStream<R>,
    {
        query(self.scan(), state)
    }

    pub(crate) async fn find_by_id(&self, id: &str) -> StoreResult<Option<E>> {
        let id = require("identifier", id)?;
        self.session.load(id).await
    }

    /// Streams the entities whose entry in `index` matches `filter`.
    ///
    /// With match verification on, each loaded entity is projected again and
    /// dropped if its current entry no longer matches.
    pub(crate) fn query(
        &self,
        index: &str,
        filter: Filter,
        projection: Projection<E::Model>,
    ) -> EntityStream<E> {
        let verify = self.session.config().verify_index_matches.then(|| {
            let filter = filter.clone();
            Arc::new(move |entity: &E| filter.matches(&projection(entity.model()))) as Verify<E>
        });
        let query = DocumentQuery::index(index).with_filter(filter);
        self.session.stream(query, verify)
    }

    /// First entity matched by `query`, if any.
    pub(crate) async fn first(
        &self,
        index: &str,
        filter: Filter,
        projection: Projection<E::Model>,
    ) -> StoreResult<Option<E>> {
        self.query(index, filter, projection).next().await.transpose()
    }

    pub(crate) fn instantiate(&self) -> StoreResult<E> {
        (self.factory)().map_err(|err| StoreError::instantiation(<E::Model as Document>::KIND, err))
    }

    /// Returns the entity's key, generating one if it has none.
    pub(crate) fn ensure_id(&self, entity: &mut E) -> String {
        if let Some(id) = entity.model().id().filter(|id| !id.is_empty()) {
            return id.to_owned();
        }
        let id = self.session.store().generate_id(Self::name());
        entity.model_mut().set_id(id.clone());
        id
    }

    /// Stores a new document, together with `related` commands, in one batch.
    pub(crate) async fn insert(
        &self,
        entity: &mut E,
        metadata: DocumentMetadata,
        related: Vec<WriteCommand>,
    ) -> StoreResult<()> {
        let id = self.ensure_id(entity);
        let put = WriteCommand::put(
            Self::name(),
            id.as_str(),
            serde_json::to_value(&*entity)?,
            WriteExpectation::Absent,
        )
        .with_metadata(metadata)
        .with_unique(entity.model().unique_constraints());

        self.write(entity, put, related).await?;
        debug!(collection = Self::name(), id = %id, "Created document");
        Ok(())
    }

    /// Overwrites a loaded document, failing if it changed since it was read.
    pub(crate) async fn replace(
        &self,
        entity: &mut E,
        metadata: DocumentMetadata,
        related: Vec<WriteCommand>,
    ) -> StoreResult<()> {
        let (id, expectation) = concurrency::expect_current(entity.model())?;
        let put = WriteCommand::put(
            Self::name(),
            id.as_str(),
            serde_json::to_value(&*entity)?,
            expectation,
        )
        .with_metadata(metadata)
        .with_unique(entity.model().unique_constraints());

        self.write(entity, put, related).await?;
        debug!(collection = Self::name(), id = %id, "Updated document");
        Ok(())
    }

    /// Deletes a loaded document, failing if it changed since it was read.
    pub(crate) async fn remove(&self, entity: &E, related: Vec<WriteCommand>) -> StoreResult<()> {
        let (id, expectation) = concurrency::expect_current(entity.model())?;
        let mut commands = vec![WriteCommand::delete(Self::name(), id.as_str(), expectation)];
        commands.extend(related);
        self.session.commit(commands).await?;
        debug!(collection = Self::name(), id = %id, "Deleted document");
        Ok(())
    }

    async fn write(&self, entity: &mut E, put: WriteCommand, related: Vec<WriteCommand>) -> StoreResult<()> {
        let mut commands = vec![put];
        commands.extend(related);
        let outcomes = self.session.commit(commands).await?;
        concurrency::stamp(entity.model_mut(), &outcomes)
    }
}

/// Factory for entities with a `Default` value.
pub(crate) fn default_factory<E: Entity + Default>() -> EntityFactory<E> {
    Arc::new(|| Ok(E::default()))
}
