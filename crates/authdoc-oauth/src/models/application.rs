//! Client application model.

use authdoc_storage::{ChangeVector, UniqueConstraint};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::locale::LocalizedStrings;
use super::{Document, DocumentState, impl_base_entity};

/// A registered OAuth client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Application {
    /// Document key, assigned on create unless set beforehand.
    #[serde(skip)]
    pub id: Option<String>,

    /// Version bookkeeping maintained by the stores.
    #[serde(skip)]
    pub state: DocumentState,

    /// Public client identifier. Unique across applications.
    pub client_id: Option<String>,

    /// Client secret, already hashed by the caller.
    pub client_secret: Option<String>,

    /// One of [`consent_types`](super::consent_types).
    pub consent_type: Option<String>,

    /// One of [`client_types`](super::client_types).
    #[serde(rename = "type")]
    pub client_type: Option<String>,

    pub display_name: Option<String>,

    pub display_names: LocalizedStrings,

    pub redirect_uris: Vec<String>,

    pub post_logout_redirect_uris: Vec<String>,

    pub permissions: Vec<String>,

    pub requirements: Vec<String>,

    /// Free-form extension properties.
    pub properties: Map<String, Value>,
}

impl Application {
    /// Creates an application with the given client identifier.
    #[must_use]
    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            ..Self::default()
        }
    }
}

impl Document for Application {
    const COLLECTION: &'static str = "applications";
    const KIND: &'static str = "application";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn change_vector(&self) -> Option<&ChangeVector> {
        self.state.change_vector()
    }

    fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    fn properties_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.properties
    }

    fn mark_persisted(&mut self, change_vector: ChangeVector) {
        self.state.persisted(change_vector);
    }

    fn unique_constraints(&self) -> Vec<UniqueConstraint> {
        self.client_id
            .iter()
            .filter(|client_id| !client_id.is_empty())
            .map(|client_id| UniqueConstraint::new(Self::COLLECTION, "clientId", client_id))
            .collect()
    }
}

impl_base_entity!(Application);
