//! Token store contract.

use async_trait::async_trait;
use time::OffsetDateTime;

use super::{EntityStore, require};
use crate::StoreResult;
use crate::models::{Entity, Token};
use crate::prune::PruneResult;
use crate::stream::EntityStream;

/// Filter for [`TokenStore::find`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenCriteria {
    pub subject: String,
    /// Key of the client application.
    pub client: String,
    pub status: Option<String>,
    pub token_type: Option<String>,
}

impl TokenCriteria {
    #[must_use]
    pub fn new(subject: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            client: client.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    #[must_use]
    pub fn with_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    pub(crate) fn validate(&self) -> StoreResult<()> {
        require("subject", &self.subject)?;
        require("client", &self.client)?;
        if let Some(status) = &self.status {
            require("status", status)?;
        }
        if let Some(token_type) = &self.token_type {
            require("type", token_type)?;
        }
        Ok(())
    }
}

/// Storage for issued tokens.
#[async_trait]
pub trait TokenStore: EntityStore<Entity: Entity<Model = Token>> {
    /// Streams the tokens matching `criteria`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for empty criteria values.
    fn find(&self, criteria: &TokenCriteria) -> StoreResult<EntityStream<Self::Entity>>;

    /// Streams the tokens issued to the application `id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for an empty key.
    fn find_by_application_id(&self, id: &str) -> StoreResult<EntityStream<Self::Entity>>;

    /// Streams the tokens issued under the authorization `id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for an empty key.
    fn find_by_authorization_id(&self, id: &str) -> StoreResult<EntityStream<Self::Entity>>;

    /// Streams the tokens issued to `subject`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for an empty subject.
    fn find_by_subject(&self, subject: &str) -> StoreResult<EntityStream<Self::Entity>>;

    /// Finds the token with the given reference identifier.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for an empty identifier.
    async fn find_by_reference_id(&self, reference_id: &str) -> StoreResult<Option<Self::Entity>>;

    /// Points the token at another authorization, or none.
    ///
    /// Only the field changes here; both authorizations' token lists are
    /// fixed up atomically by the next `create` or `update`.
    fn set_authorization_id(&self, token: &mut Self::Entity, id: Option<&str>) {
        token.model_mut().authorization_id = id.filter(|id| !id.is_empty()).map(str::to_owned);
    }

    /// Deletes tokens created before `threshold` that are no longer usable:
    /// their own status is neither `inactive` nor `valid`, or their
    /// authorization is not `valid` (or no longer exists).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Operation` with the number of tokens already
    /// deleted if the store stops early.
    async fn prune(&self, threshold: OffsetDateTime) -> StoreResult<PruneResult>;
}
