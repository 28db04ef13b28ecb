use async_trait::async_trait;
use authdoc_storage::{DocumentMetadata, Filter};
use tracing::instrument;

use super::{DocumentCollection, EntityFactory, default_factory};
use crate::StoreResult;
use crate::indexes::application::{self as index, fields};
use crate::models::{Application, Entity};
use crate::session::Session;
use crate::storage::{ApplicationStore, EntityStore, require};
use crate::stream::{EntityStream, QueryStream};

/// [`ApplicationStore`] over the `applications` collection.
pub struct DocumentApplicationStore<E: Entity = Application> {
    documents: DocumentCollection<E>,
}

impl<E: Entity<Model = Application> + Default> DocumentApplicationStore<E> {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self::with_factory(session, default_factory())
    }
}

impl<E: Entity<Model = Application>> DocumentApplicationStore<E> {
    /// Creates a store that builds blank entities with `factory`.
    #[must_use]
    pub fn with_factory(session: Session, factory: EntityFactory<E>) -> Self {
        Self {
            documents: DocumentCollection::new(session, factory),
        }
    }
}

#[async_trait]
impl<E: Entity<Model = Application>> EntityStore for DocumentApplicationStore<E> {
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

    #[instrument(skip_all, fields(client_id = ?application.model().client_id))]
    async fn create(&self, application: &mut E) -> StoreResult<()> {
        self.documents
            .insert(application, DocumentMetadata::default(), Vec::new())
            .await
    }

    async fn delete(&self, application: &E) -> StoreResult<()> {
        self.documents.remove(application, Vec::new()).await
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

    #[instrument(skip_all, fields(id = ?application.model().id))]
    async fn update(&self, application: &mut E) -> StoreResult<()> {
        self.documents
            .replace(application, DocumentMetadata::default(), Vec::new())
            .await
    }
}

#[async_trait]
impl<E: Entity<Model = Application>> ApplicationStore for DocumentApplicationStore<E> {
    async fn find_by_client_id(&self, client_id: &str) -> StoreResult<Option<E>> {
        let client_id = require("client_id", client_id)?;
        self.documents
            .first(index::NAME, Filter::eq(fields::CLIENT_ID, client_id), index::entry)
            .await
    }

    fn find_by_redirect_uri(&self, uri: &str) -> StoreResult<EntityStream<E>> {
        let uri = require("address", uri)?;
        Ok(self.documents.query(
            index::NAME,
            Filter::contains(fields::REDIRECT_URIS, uri),
            index::entry,
        ))
    }

    fn find_by_post_logout_redirect_uri(&self, uri: &str) -> StoreResult<EntityStream<E>> {
        let uri = require("address", uri)?;
        Ok(self.documents.query(
            index::NAME,
            Filter::contains(fields::POST_LOGOUT_REDIRECT_URIS, uri),
            index::entry,
        ))
    }
}
