//! Scope model.

use authdoc_storage::{ChangeVector, UniqueConstraint};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::locale::LocalizedStrings;
use super::{Document, DocumentState, impl_base_entity};

/// A named permission a client can request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Scope {
    #[serde(skip)]
    pub id: Option<String>,

    /// Version bookkeeping maintained by the stores.
    #[serde(skip)]
    pub state: DocumentState,

    /// Scope name. Unique across scopes.
    pub name: Option<String>,

    pub display_name: Option<String>,

    pub display_names: LocalizedStrings,

    pub description: Option<String>,

    pub descriptions: LocalizedStrings,

    /// Audiences the scope grants access to.
    pub resources: Vec<String>,

    pub properties: Map<String, Value>,
}

impl Scope {
    /// Creates a scope with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

impl Document for Scope {
    const COLLECTION: &'static str = "scopes";
    const KIND: &'static str = "scope";

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
        self.name
            .iter()
            .filter(|name| !name.is_empty())
            .map(|name| UniqueConstraint::new(Self::COLLECTION, "name", name))
            .collect()
    }
}

impl_base_entity!(Scope);
