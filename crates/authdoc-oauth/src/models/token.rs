//! Token model.

use authdoc_storage::ChangeVector;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use super::{Document, DocumentState, impl_base_entity};

/// An issued token (access, refresh, authorization code, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Token {
    #[serde(skip)]
    pub id: Option<String>,

    /// Version bookkeeping maintained by the stores.
    #[serde(skip)]
    pub state: DocumentState,

    pub application_id: Option<String>,

    /// Key of the owning authorization, if any. Change it through
    /// `TokenStore::set_authorization_id` or directly; the owning
    /// authorizations' `tokens` lists are fixed up on the next write.
    pub authorization_id: Option<String>,

    pub subject: Option<String>,

    /// One of [`statuses`](super::statuses).
    pub status: Option<String>,

    #[serde(rename = "type")]
    pub token_type: Option<String>,

    /// Opaque identifier used by reference tokens.
    pub reference_id: Option<String>,

    #[serde(with = "time::serde::rfc3339::option")]
    pub creation_date: Option<OffsetDateTime>,

    #[serde(with = "time::serde::rfc3339::option")]
    pub expiration_date: Option<OffsetDateTime>,

    #[serde(with = "time::serde::rfc3339::option")]
    pub redemption_date: Option<OffsetDateTime>,

    pub payload: Option<String>,

    pub properties: Map<String, Value>,
}

impl Token {
    pub(crate) fn persisted_authorization_id(&self) -> Option<&str> {
        self.state.owner()
    }
}

impl Document for Token {
    const COLLECTION: &'static str = "tokens";
    const KIND: &'static str = "token";

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
        let owner = self.authorization_id.clone();
        self.state.persisted_with_owner(change_vector, owner);
    }
}

impl_base_entity!(Token);
