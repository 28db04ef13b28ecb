//! # authdoc-oauth
//!
//! OAuth/OIDC entity stores on top of a schema-less document store.
//!
//! Four stores are provided: applications, authorizations, scopes and tokens.
//! Lookups other than by key go through asynchronously materialized secondary
//! indexes, so they may briefly miss recent writes. Writes are versioned: an
//! entity loaded before a concurrent change fails to update or delete with
//! [`StoreError::Concurrency`].
//!
//! Authorizations list the keys of their tokens. The token store keeps those
//! lists current through atomic patches committed with each token write.
//!
//! ## Example
//!
//! ```ignore
//! use authdoc_oauth::prelude::*;
//!
//! let stores = AuthStores::new(authdoc_db_memory::create_memory_store(), StoreConfig::default());
//! stores.ensure_indexes().await?;
//!
//! let session = stores.open_session();
//! let applications = session.applications();
//!
//! let mut application = Application::with_client_id("portal");
//! applications.create(&mut application).await?;
//! ```

mod backrefs;
mod concurrency;
pub mod config;
pub mod document;
mod error;
pub mod indexes;
pub mod models;
pub mod properties;
pub mod prune;
mod session;
pub mod storage;
mod stream;

use std::sync::Arc;

use authdoc_storage::DynDocumentStore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use config::{ConfigError, PruneConfig, StoreConfig};
pub use document::{
    DocumentApplicationStore, DocumentAuthorizationStore, DocumentScopeStore, DocumentTokenStore,
    EntityFactory,
};
pub use error::{ErrorCategory, StoreError};
pub use models::{Application, Authorization, Document, DocumentState, Entity, Scope, Token};
pub use prune::PruneResult;
pub use session::Session;
pub use storage::{
    ApplicationStore, AuthorizationCriteria, AuthorizationStore, EntityStore, ScopeStore,
    TokenCriteria, TokenStore,
};
pub use stream::{EntityStream, QueryStream, Verify};

/// Type alias for an entity store result.
pub type StoreResult<T> = Result<T, StoreError>;

/// Entry point binding a document store to a store configuration.
#[derive(Clone)]
pub struct AuthStores {
    store: DynDocumentStore,
    config: Arc<StoreConfig>,
}

impl AuthStores {
    #[must_use]
    pub fn new(store: DynDocumentStore, config: StoreConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn store(&self) -> &DynDocumentStore {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Registers every secondary index the stores query.
    ///
    /// # Errors
    ///
    /// Returns the first registration failure reported by the store.
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        indexes::register_all(self.store.as_ref()).await?;
        Ok(())
    }

    /// Opens a session that is never cancelled from outside.
    #[must_use]
    pub fn open_session(&self) -> Session {
        self.open_session_with(CancellationToken::new())
    }

    /// Opens a session bound to `cancellation`, typically the request's.
    #[must_use]
    pub fn open_session_with(&self, cancellation: CancellationToken) -> Session {
        debug!(backend = self.store.backend_name(), "Opening session");
        Session::with_cancellation(self.store.clone(), self.config.clone(), cancellation)
    }
}

impl std::fmt::Debug for AuthStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStores")
            .field("backend", &self.store.backend_name())
            .field("config", &self.config)
            .finish()
    }
}

/// Prelude module for convenient imports.
///
/// ```ignore
/// use authdoc_oauth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{PruneConfig, StoreConfig};
    pub use crate::document::{
        DocumentApplicationStore, DocumentAuthorizationStore, DocumentScopeStore,
        DocumentTokenStore,
    };
    pub use crate::error::{ErrorCategory, StoreError};
    pub use crate::models::{
        Application, Authorization, Document, DocumentState, Entity, Scope, Token,
    };
    pub use crate::prune::PruneResult;
    pub use crate::session::Session;
    pub use crate::storage::{
        ApplicationStore, AuthorizationCriteria, AuthorizationStore, EntityStore, ScopeStore,
        TokenCriteria, TokenStore,
    };
    pub use crate::stream::{EntityStream, QueryStream};
    pub use crate::{AuthStores, StoreResult};
}
