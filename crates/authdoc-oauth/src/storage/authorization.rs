//! Authorization store contract.

use async_trait::async_trait;
use time::OffsetDateTime;

use super::{EntityStore, require};
use crate::StoreResult;
use crate::error::StoreError;
use crate::models::{Authorization, Entity};
use crate::stream::EntityStream;

/// Filter for [`AuthorizationStore::find`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationCriteria {
    pub subject: String,
    /// Key of the client application.
    pub client: String,
    pub status: Option<String>,
    pub authorization_type: Option<String>,
    /// Scopes the authorization must all hold.
    pub scopes: Vec<String>,
}

impl AuthorizationCriteria {
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
    pub fn with_type(mut self, authorization_type: impl Into<String>) -> Self {
        self.authorization_type = Some(authorization_type.into());
        self
    }

    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn validate(&self) -> StoreResult<()> {
        require("subject", &self.subject)?;
        require("client", &self.client)?;
        if let Some(status) = &self.status {
            require("status", status)?;
        }
        if let Some(authorization_type) = &self.authorization_type {
            require("type", authorization_type)?;
        }
        if self.scopes.iter().any(String::is_empty) {
            return Err(StoreError::invalid_argument(
                "scopes",
                "scopes cannot contain empty values",
            ));
        }
        Ok(())
    }
}

/// Storage for authorization grants.
#[async_trait]
pub trait AuthorizationStore: EntityStore<Entity: Entity<Model = Authorization>> {
    /// Streams the authorizations matching `criteria`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for empty criteria values.
    fn find(&self, criteria: &AuthorizationCriteria) -> StoreResult<EntityStream<Self::Entity>>;

    /// Streams the authorizations given to the application `id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for an empty key.
    fn find_by_application_id(&self, id: &str) -> StoreResult<EntityStream<Self::Entity>>;

    /// Streams the authorizations given by `subject`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidArgument` for an empty subject.
    fn find_by_subject(&self, subject: &str) -> StoreResult<EntityStream<Self::Entity>>;

    /// Removes stale authorizations.
    ///
    /// # Errors
    ///
    /// Always returns `StoreError::NotSupported`: authorizations are cleaned
    /// up by pruning their tokens.
    async fn prune(&self, threshold: OffsetDateTime) -> StoreResult<u64>;
}
