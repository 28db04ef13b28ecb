//! `ScopeIndex`: scopes by name and resource.

use authdoc_storage::{IndexDefinition, IndexEntry};

use super::{decode, strings, text};
use crate::models::{Document, Scope};

pub const NAME: &str = "ScopeIndex";

/// Indexed field names.
pub mod fields {
    pub const NAME: &str = "name";
    pub const RESOURCES: &str = "resources";
}

#[must_use]
pub fn definition() -> IndexDefinition {
    IndexDefinition::new(NAME, Scope::COLLECTION, |document, _| {
        decode::<Scope>(NAME, document)
            .map(|scope| vec![entry(&scope)])
            .unwrap_or_default()
    })
}

pub(crate) fn entry(scope: &Scope) -> IndexEntry {
    let mut entry = IndexEntry::new();
    entry.insert(fields::NAME.into(), text(scope.name.as_deref()));
    entry.insert(fields::RESOURCES.into(), strings(&scope.resources));
    entry
}
