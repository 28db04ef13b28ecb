use async_trait::async_trait;
use authdoc_storage::{DocumentMetadata, Filter};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, instrument};

use super::{DocumentCollection, EntityFactory, default_factory};
use crate::StoreResult;
use crate::backrefs;
use crate::concurrency;
use crate::indexes::token::{self as index, fields};
use crate::models::{Entity, Token};
use crate::prune::{self, PruneResult};
use crate::session::Session;
use crate::storage::{EntityStore, TokenCriteria, TokenStore, require};
use crate::stream::{EntityStream, QueryStream};

/// [`TokenStore`] over the `tokens` collection.
///
/// Every write also patches the owning authorizations' `tokens` lists in the
/// same atomic batch.
pub struct DocumentTokenStore<E: Entity = Token> {
    documents: DocumentCollection<E>,
}

impl<E: Entity<Model = Token> + Default> DocumentTokenStore<E> {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self::with_factory(session, default_factory())
    }
}

impl<E: Entity<Model = Token>> DocumentTokenStore<E> {
    #[must_use]
    pub fn with_factory(session: Session, factory: EntityFactory<E>) -> Self {
        Self {
            documents: DocumentCollection::new(session, factory),
        }
    }

    fn metadata(&self, token: &E) -> DocumentMetadata {
        let expires = self
            .documents
            .session()
            .config()
            .token_expiration_metadata
            .then_some(token.model().expiration_date)
            .flatten();
        DocumentMetadata::default().with_expires(expires)
    }

    fn query(&self, filter: Filter) -> EntityStream<E> {
        self.documents.query(index::NAME, filter, projection)
    }
}

// Token lookups never filter on the joined authorization status.
fn projection(token: &Token) -> authdoc_storage::IndexEntry {
    index::entry(token, Value::Null)
}

#[async_trait]
impl<E: Entity<Model = Token>> EntityStore for DocumentTokenStore<E> {
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

    #[instrument(skip_all, fields(authorization_id = ?token.model().authorization_id))]
    async fn create(&self, token: &mut E) -> StoreResult<()> {
        let id = self.documents.ensure_id(token);
        let model = token.model();
        let related = backrefs::relink(
            &id,
            model.persisted_authorization_id(),
            model.authorization_id.as_deref(),
        );
        let metadata = self.metadata(token);
        self.documents.insert(token, metadata, related).await
    }

    #[instrument(skip_all, fields(id = ?token.model().id))]
    async fn delete(&self, token: &E) -> StoreResult<()> {
        let (id, _) = concurrency::expect_current(token.model())?;
        let related = backrefs::detach(&id, token.model().persisted_authorization_id());
        self.documents.remove(token, related).await
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

    #[instrument(skip_all, fields(id = ?token.model().id))]
    async fn update(&self, token: &mut E) -> StoreResult<()> {
        let (id, _) = concurrency::expect_current(token.model())?;
        let model = token.model();
        let related = backrefs::relink(
            &id,
            model.persisted_authorization_id(),
            model.authorization_id.as_deref(),
        );
        if !related.is_empty() {
            debug!(
                from = ?model.persisted_authorization_id(),
                to = ?model.authorization_id,
                "Moving token between authorizations"
            );
        }
        let metadata = self.metadata(token);
        self.documents.replace(token, metadata, related).await
    }
}

#[async_trait]
impl<E: Entity<Model = Token>> TokenStore for DocumentTokenStore<E> {
    fn find(&self, criteria: &TokenCriteria) -> StoreResult<EntityStream<E>> {
        criteria.validate()?;

        let mut filters = vec![
            Filter::eq(fields::SUBJECT, criteria.subject.as_str()),
            Filter::eq(fields::APPLICATION_ID, criteria.client.as_str()),
        ];
        if let Some(status) = &criteria.status {
            filters.push(Filter::eq(fields::STATUS, status.as_str()));
        }
        if let Some(token_type) = &criteria.token_type {
            filters.push(Filter::eq(fields::TYPE, token_type.as_str()));
        }
        Ok(self.query(Filter::and(filters)))
    }

    fn find_by_application_id(&self, id: &str) -> StoreResult<EntityStream<E>> {
        let id = require("identifier", id)?;
        Ok(self.query(Filter::eq(fields::APPLICATION_ID, id)))
    }

    fn find_by_authorization_id(&self, id: &str) -> StoreResult<EntityStream<E>> {
        let id = require("identifier", id)?;
        Ok(self.query(Filter::eq(fields::AUTHORIZATION_ID, id)))
    }

    fn find_by_subject(&self, subject: &str) -> StoreResult<EntityStream<E>> {
        let subject = require("subject", subject)?;
        Ok(self.query(Filter::eq(fields::SUBJECT, subject)))
    }

    async fn find_by_reference_id(&self, reference_id: &str) -> StoreResult<Option<E>> {
        let reference_id = require("identifier", reference_id)?;
        self.documents
            .first(
                index::NAME,
                Filter::eq(fields::REFERENCE_ID, reference_id),
                projection,
            )
            .await
    }

    async fn prune(&self, threshold: OffsetDateTime) -> StoreResult<PruneResult> {
        prune::prune_tokens(self.documents.session(), threshold).await
    }
}
