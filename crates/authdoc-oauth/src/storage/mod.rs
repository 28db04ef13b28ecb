//! Store contracts consumed by the OAuth/OIDC protocol layer.
//!
//! [`EntityStore`] holds the operations every store offers; the per-entity
//! traits add the lookups specific to each kind. All stores are bound to a
//! concrete entity type at compile time through the `Entity` associated type.
//!
//! # Implementations
//!
//! Document-store backed implementations live in [`crate::document`].

pub mod application;
pub mod authorization;
pub mod scope;
pub mod token;

pub use application::ApplicationStore;
pub use authorization::{AuthorizationCriteria, AuthorizationStore};
pub use scope::ScopeStore;
pub use token::{TokenCriteria, TokenStore};

use async_trait::async_trait;

use crate::StoreResult;
use crate::error::StoreError;
use crate::models::{Document, Entity};
use crate::properties::{self, PropertyBag};
use crate::stream::{EntityStream, QueryStream};

/// Operations shared by every entity store.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// The entity type this store reads and writes.
    type Entity: Entity;

    /// Counts the stored entities.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached.
    async fn count(&self) -> StoreResult<u64>;

    /// Counts the results of a caller projection over every stored entity.
    ///
    /// # Errors
    ///
    /// Returns the first error yielded by the projection.
    async fn count_with<R, F>(&self, query: F) -> StoreResult<u64>
    where
        R: Send + 'static,
        F: FnOnce(EntityStream<Self::Entity>) -> QueryStream<R> + Send + 'static;

    /// Persists a new entity.
    ///
    /// A key is generated unless the entity already has one. On success the
    /// entity carries its key and version token.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the key or a unique value is taken.
    async fn create(&self, entity: &mut Self::Entity) -> StoreResult<()>;

    /// Deletes an entity loaded from this store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Concurrency` if the entity changed since it was
    /// loaded, `StoreError::InvalidArgument` if it was never loaded.
    async fn delete(&self, entity: &Self::Entity) -> StoreResult<()>;

    /// Looks up an entity by key.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for an empty key.
    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Self::Entity>>;

    /// Returns the first result of a caller projection over every stored
    /// entity.
    ///
    /// # Errors
    ///
    /// Returns the error yielded by the projection, if any.
    async fn get_with<S, R, F>(&self, state: S, query: F) -> StoreResult<Option<R>>
    where
        S: Send + 'static,
        R: Send + 'static,
        F: FnOnce(EntityStream<Self::Entity>, S) -> QueryStream<R> + Send + 'static;

    /// Builds a blank entity.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Instantiation` if the entity factory fails.
    fn instantiate(&self) -> StoreResult<Self::Entity>;

    /// Streams stored entities in the store's default order, skipping
    /// `offset` and yielding at most `count`.
    fn list(&self, count: Option<usize>, offset: Option<usize>) -> EntityStream<Self::Entity>;

    /// Streams the results of a caller projection over every stored entity.
    fn list_with<S, R, F>(&self, state: S, query: F) -> QueryStream<R>
    where
        S: Send + 'static,
        R: Send + 'static,
        F: FnOnce(EntityStream<Self::Entity>, S) -> QueryStream<R>;

    /// Writes back an entity loaded from this store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Concurrency` if the entity changed since it was
    /// loaded, `StoreError::Conflict` if a unique value is taken.
    async fn update(&self, entity: &mut Self::Entity) -> StoreResult<()>;

    /// Reads the entity's extension properties.
    fn get_properties(&self, entity: &Self::Entity) -> PropertyBag {
        properties::decode(entity.model().properties())
    }

    /// Replaces the entity's extension properties. Null values are dropped.
    fn set_properties(&self, entity: &mut Self::Entity, bag: PropertyBag) {
        *entity.model_mut().properties_mut() = properties::encode(bag);
    }
}

/// Rejects empty identifiers before any query is issued.
pub(crate) fn require<'a>(name: &'static str, value: &'a str) -> StoreResult<&'a str> {
    if value.is_empty() {
        Err(StoreError::empty_argument(name))
    } else {
        Ok(value)
    }
}
