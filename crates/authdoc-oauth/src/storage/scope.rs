//! Scope store contract.

use async_trait::async_trait;

use super::EntityStore;
use crate::StoreResult;
use crate::models::{Entity, Scope};
use crate::stream::EntityStream;

/// Storage for scopes.
#[async_trait]
pub trait ScopeStore: EntityStore<Entity: Entity<Model = Scope>> {
    /// Finds the scope named `name`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for an empty name.
    async fn find_by_name(&self, name: &str) -> StoreResult<Option<Self::Entity>>;

    /// Streams the scopes whose name is one of `names`. An empty list yields
    /// an empty stream without querying the store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` if any name is empty.
    fn find_by_names(&self, names: &[&str]) -> StoreResult<EntityStream<Self::Entity>>;

    /// Streams the scopes granting access to `resource`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for an empty resource.
    fn find_by_resource(&self, resource: &str) -> StoreResult<EntityStream<Self::Entity>>;
}
