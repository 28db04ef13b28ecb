//! Application store contract.

use async_trait::async_trait;

use super::EntityStore;
use crate::StoreResult;
use crate::models::{Application, Entity};
use crate::stream::EntityStream;

/// Storage for registered client applications.
#[async_trait]
pub trait ApplicationStore: EntityStore<Entity: Entity<Model = Application>> {
    /// Finds the application registered under `client_id`.
    ///
    /// Backed by `ApplicationIndex`, so an application created moments ago
    /// may not be found yet. A returned application always carries the
    /// requested client id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for an empty client id.
    async fn find_by_client_id(&self, client_id: &str) -> StoreResult<Option<Self::Entity>>;

    /// Streams applications that list `uri` as a redirect URI.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for an empty URI.
    fn find_by_redirect_uri(&self, uri: &str) -> StoreResult<EntityStream<Self::Entity>>;

    /// Streams applications that list `uri` as a post-logout redirect URI.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for an empty URI.
    fn find_by_post_logout_redirect_uri(
        &self,
        uri: &str,
    ) -> StoreResult<EntityStream<Self::Entity>>;
}
