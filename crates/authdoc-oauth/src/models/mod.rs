//! Entity models persisted by the stores.
//!
//! Each model is a plain serde struct whose body is stored as a camelCase
//! JSON document. The document key and version token live next to the body,
//! never inside it.
//!
//! Applications that need extra fields embed a base model with
//! `#[serde(flatten)]` and implement [`Entity`] to expose it:
//!
//! ```ignore
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct TenantApplication {
//!     #[serde(flatten)]
//!     base: Application,
//!     tenant: String,
//! }
//!
//! impl Entity for TenantApplication {
//!     type Model = Application;
//!     fn model(&self) -> &Application { &self.base }
//!     fn model_mut(&mut self) -> &mut Application { &mut self.base }
//! }
//! ```

pub mod application;
pub mod authorization;
pub mod locale;
pub mod scope;
pub mod token;

use authdoc_storage::{ChangeVector, UniqueConstraint};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub use application::Application;
pub use authorization::Authorization;
pub use scope::Scope;
pub use token::Token;

/// Persistence state tracked next to a model's body.
///
/// Opaque to callers: the stores fill it in on every read and write, and a
/// model built with `..Default::default()` starts out unsaved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentState {
    change_vector: Option<ChangeVector>,
    /// Owner reference the document was last read or written with.
    owner: Option<String>,
}

impl DocumentState {
    /// Version token of the last read or write, if any.
    pub fn change_vector(&self) -> Option<&ChangeVector> {
        self.change_vector.as_ref()
    }

    pub(crate) fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub(crate) fn persisted(&mut self, change_vector: ChangeVector) {
        self.change_vector = Some(change_vector);
    }

    pub(crate) fn persisted_with_owner(
        &mut self,
        change_vector: ChangeVector,
        owner: Option<String>,
    ) {
        self.change_vector = Some(change_vector);
        self.owner = owner;
    }
}

/// A base model stored as one document.
pub trait Document: Send + Sync + 'static {
    /// Collection holding documents of this kind.
    const COLLECTION: &'static str;

    /// Human-readable kind, used in errors and logs.
    const KIND: &'static str;

    /// The document key, once assigned.
    fn id(&self) -> Option<&str>;

    /// Assigns the document key.
    fn set_id(&mut self, id: String);

    /// Version token captured when the document was last read or written.
    fn change_vector(&self) -> Option<&ChangeVector>;

    /// Records a successful read or write at `change_vector`.
    fn mark_persisted(&mut self, change_vector: ChangeVector);

    /// Free-form extension properties.
    fn properties(&self) -> &Map<String, Value>;

    fn properties_mut(&mut self) -> &mut Map<String, Value>;

    /// Values that at most one document of this kind may hold.
    fn unique_constraints(&self) -> Vec<UniqueConstraint> {
        Vec::new()
    }
}

/// A concrete entity type bound to a store.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// The base model this entity extends.
    type Model: Document;

    /// Borrows the base model.
    fn model(&self) -> &Self::Model;

    /// Mutably borrows the base model.
    fn model_mut(&mut self) -> &mut Self::Model;
}

macro_rules! impl_base_entity {
    ($model:ty) => {
        impl $crate::models::Entity for $model {
            type Model = Self;

            fn model(&self) -> &Self {
                self
            }

            fn model_mut(&mut self) -> &mut Self {
                self
            }
        }
    };
}

pub(crate) use impl_base_entity;

/// Well-known entity statuses.
pub mod statuses {
    pub const INACTIVE: &str = "inactive";
    pub const REDEEMED: &str = "redeemed";
    pub const REJECTED: &str = "rejected";
    pub const REVOKED: &str = "revoked";
    pub const VALID: &str = "valid";
}

/// Well-known client types.
pub mod client_types {
    pub const CONFIDENTIAL: &str = "confidential";
    pub const PUBLIC: &str = "public";
}

/// Well-known consent types.
pub mod consent_types {
    pub const EXPLICIT: &str = "explicit";
    pub const EXTERNAL: &str = "external";
    pub const IMPLICIT: &str = "implicit";
    pub const SYSTEMATIC: &str = "systematic";
}

/// Well-known authorization types.
pub mod authorization_types {
    pub const AD_HOC: &str = "ad-hoc";
    pub const PERMANENT: &str = "permanent";
}
