use async_trait::async_trait;
use authdoc_storage::{DocumentMetadata, Filter};

use super::{DocumentCollection, EntityFactory, default_factory};
use crate::StoreResult;
use crate::error::StoreError;
use crate::indexes::scope::{self as index, fields};
use crate::models::{Entity, Scope};
use crate::session::Session;
use crate::storage::{EntityStore, ScopeStore, require};
use crate::stream::{EntityStream, QueryStream};

/// [`ScopeStore`] over the `scopes` collection.
pub struct DocumentScopeStore<E: Entity = Scope> {
    documents: DocumentCollection<E>,
}

impl<E: Entity<Model = Scope> + Default> DocumentScopeStore<E> {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self::with_factory(session, default_factory())
    }
}

impl<E: Entity<Model = Scope>> DocumentScopeStore<E> {
    #[must_use]
    pub fn with_factory(session: Session, factory: EntityFactory<E>) -> Self {
        Self {
            documents: DocumentCollection::new(session, factory),
        }
    }
}

#[async_trait]
impl<E: Entity<Model = Scope>> EntityStore for DocumentScopeStore<E> {
    type Entity = E;

    async fn count(&self) -> StoreResult<u64> {
        self.documents.count().await
    }

    async fn count_with<R, F>(&self, query: F) -> StoreResult<u64>
    where
        R: Send + 'static,
        F: FnOnce(EntityStream<E>) -> QueryStream<R> + Send + 'static,
    {
        self.documents.count_with(query).await
    }

    async fn create(&self, scope: &mut E) -> StoreResult<()> {
        self.documents
            .insert(scope, DocumentMetadata::default(), Vec::new())
            .await
    }

    async fn delete(&self, scope: &E) -> StoreResult<()> {
        self.documents.remove(scope, Vec::new()).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<E>> {
        self.documents.find_by_id(id).await
    }

    async fn get_with<S, R, F>(&self, state: S, query: F) -> StoreResult<Option<R>>
    where
        S: Send + 'static,
        R: Send + 'static,
        F: FnOnce(EntityStream<E>, S) -> QueryStream<R> + Send + 'static,
    {
        self.documents.get_with(state, query).await
    }

    fn instantiate(&self) -> StoreResult<E> {
        self.documents.instantiate()
    }

    fn list(&self, count: Option<usize>, offset: Option<usize>) -> EntityStream<E> {
        self.documents.list(count, offset)
    }

    fn list_with<S, R, F>(&self, state: S, query: F) -> QueryStream<R>
    where
        S: Send + 'static,
        R: Send + 'static,
        F: FnOnce(EntityStream<E>, S) -> QueryStream<R>,
    {
        self.documents.list_with(state, query)
    }

    async fn update(&self, scope: &mut E) -> StoreResult<()> {
        self.documents
            .replace(scope, DocumentMetadata::default(), Vec::new())
            .await
    }
}

#[async_trait]
impl<E: Entity<Model = Scope>> ScopeStore for DocumentScopeStore<E> {
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<E>> {
        let name = require("name", name)?;
        self.documents
            .first(index::NAME, Filter::eq(fields::NAME, name), index::entry)
            .await
    }

    fn find_by_names(&self, names: &[&str]) -> StoreResult<EntityStream<E>> {
        if names.iter().any(|name| name.is_empty()) {
            return Err(StoreError::invalid_argument(
                "names",
                "scope names cannot be null or empty",
            ));
        }
        if names.is_empty() {
            return Ok(EntityStream::empty());
        }
        Ok(self.documents.query(
            index::NAME,
            Filter::is_in(fields::NAME, names.iter().copied()),
            index::entry,
        ))
    }

    fn find_by_resource(&self, resource: &str) -> StoreResult<EntityStream<E>> {
        let resource = require("resource", resource)?;
        Ok(self.documents.query(
            index::NAME,
            Filter::contains(fields::RESOURCES, resource),
            index::entry,
        ))
    }
}
