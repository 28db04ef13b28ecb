use async_trait::async_trait;
use authdoc_storage::{DocumentMetadata, Filter};
use time::OffsetDateTime;
use tracing::{instrument, warn};

use super::{DocumentCollection, EntityFactory, default_factory};
use crate::StoreResult;
use crate::error::StoreError;
use crate::indexes::authorization::{self as index, fields};
use crate::models::{Authorization, Entity};
use crate::session::Session;
use crate::storage::{AuthorizationCriteria, AuthorizationStore, EntityStore, require};
use crate::stream::{EntityStream, QueryStream};

/// [`AuthorizationStore`] over the `authorizations` collection.
///
/// Authorizations cannot be deleted through this store: tokens keep
/// pointing at them, and they are cleaned up through token pruning.
pub struct DocumentAuthorizationStore<E: Entity = Authorization> {
    documents: DocumentCollection<E>,
}

impl<E: Entity<Model = Authorization> + Default> DocumentAuthorizationStore<E> {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self::with_factory(session, default_factory())
    }
}

impl<E: Entity<Model = Authorization>> DocumentAuthorizationStore<E> {
    #[must_use]
    pub fn with_factory(session: Session, factory: EntityFactory<E>) -> Self {
        Self {
            documents: DocumentCollection::new(session, factory),
        }
    }
}

#[async_trait]
impl<E: Entity<Model = Authorization>> EntityStore for DocumentAuthorizationStore<E> {
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

    #[instrument(skip_all, fields(subject = ?authorization.model().subject))]
    async fn create(&self, authorization: &mut E) -> StoreResult<()> {
        self.documents
            .insert(authorization, DocumentMetadata::default(), Vec::new())
            .await
    }

    async fn delete(&self, authorization: &E) -> StoreResult<()> {
        warn!(id = ?authorization.model().id, "Refusing to delete an authorization");
        Err(StoreError::not_supported("delete authorization"))
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

    #[instrument(skip_all, fields(id = ?authorization.model().id))]
    async fn update(&self, authorization: &mut E) -> StoreResult<()> {
        self.documents
            .replace(authorization, DocumentMetadata::default(), Vec::new())
            .await
    }
}

#[async_trait]
impl<E: Entity<Model = Authorization>> AuthorizationStore for DocumentAuthorizationStore<E> {
    fn find(&self, criteria: &AuthorizationCriteria) -> StoreResult<EntityStream<E>> {
        criteria.validate()?;

        let mut filters = vec![
            Filter::eq(fields::SUBJECT, criteria.subject.as_str()),
            Filter::eq(fields::APPLICATION_ID, criteria.client.as_str()),
        ];
        if let Some(status) = &criteria.status {
            filters.push(Filter::eq(fields::STATUS, status.as_str()));
        }
        if let Some(authorization_type) = &criteria.authorization_type {
            filters.push(Filter::eq(fields::TYPE, authorization_type.as_str()));
        }
        if !criteria.scopes.is_empty() {
            filters.push(Filter::contains_all(
                fields::SCOPES,
                criteria.scopes.iter().map(String::as_str),
            ));
        }

        Ok(self
            .documents
            .query(index::NAME, Filter::and(filters), index::entry))
    }

    fn find_by_application_id(&self, id: &str) -> StoreResult<EntityStream<E>> {
        let id = require("identifier", id)?;
        Ok(self.documents.query(
            index::NAME,
            Filter::eq(fields::APPLICATION_ID, id),
            index::entry,
        ))
    }

    fn find_by_subject(&self, subject: &str) -> StoreResult<EntityStream<E>> {
        let subject = require("subject", subject)?;
        Ok(self
            .documents
            .query(index::NAME, Filter::eq(fields::SUBJECT, subject), index::entry))
    }

    async fn prune(&self, _threshold: OffsetDateTime) -> StoreResult<u64> {
        Err(StoreError::not_supported("prune authorizations"))
    }
}
