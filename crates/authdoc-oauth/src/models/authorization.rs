//! Authorization grant model.

use authdoc_storage::ChangeVector;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use super::{Document, DocumentState, impl_base_entity};

/// A grant given by a subject to a client application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Authorization {
    #[serde(skip)]
    pub id: Option<String>,

    /// Version bookkeeping maintained by the stores.
    #[serde(skip)]
    pub state: DocumentState,

    /// Key of the application the grant was given to.
    pub application_id: Option<String>,

    pub subject: Option<String>,

    /// One of [`statuses`](super::statuses).
    pub status: Option<String>,

    /// One of [`authorization_types`](super::authorization_types).
    #[serde(rename = "type")]
    pub authorization_type: Option<String>,

    #[serde(with = "time::serde::rfc3339::option")]
    pub creation_date: Option<OffsetDateTime>,

    pub scopes: Vec<String>,

    pub properties: Map<String, Value>,

    /// Keys of the tokens issued under this grant.
    ///
    /// Maintained by the token store through atomic patches. Writes through
    /// the authorization store carry it unchanged.
    pub tokens: Vec<String>,
}

impl Document for Authorization {
    const COLLECTION: &'static str = "authorizations";
    const KIND: &'static str = "authorization";

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
}

impl_base_entity!(Authorization);
