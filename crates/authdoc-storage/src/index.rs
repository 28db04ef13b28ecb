//! Secondary index definitions.
//!
//! An index is a pure map function from a document (plus any documents it
//! loads by key) to zero or more flat entries. Drivers materialize entries
//! asynchronously, so index reads may lag behind writes.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::types::StoredDocument;

/// A flat map of indexed field names to values.
pub type IndexEntry = Map<String, Value>;

/// Loads related documents while an index entry is computed.
///
/// Drivers record every key requested through the loader and recompute the
/// entry when one of those documents changes.
pub trait DocumentLoader {
    /// Returns the body of `collection/id`, or `None` if it does not exist.
    fn load(&mut self, collection: &str, id: &str) -> Option<Value>;
}

type MapFunction =
    Arc<dyn Fn(&StoredDocument, &mut dyn DocumentLoader) -> Vec<IndexEntry> + Send + Sync>;

/// A named map-only index over one collection.
#[derive(Clone)]
pub struct IndexDefinition {
    name: String,
    collection: String,
    map: MapFunction,
}

impl IndexDefinition {
    /// Creates an index named `name` over `collection`.
    pub fn new<F>(name: impl Into<String>, collection: impl Into<String>, map: F) -> Self
    where
        F: Fn(&StoredDocument, &mut dyn DocumentLoader) -> Vec<IndexEntry> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            collection: collection.into(),
            map: Arc::new(map),
        }
    }

    /// Returns the index name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the indexed collection.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Computes the entries for one document.
    pub fn map(&self, document: &StoredDocument, loader: &mut dyn DocumentLoader) -> Vec<IndexEntry> {
        (self.map)(document, loader)
    }
}

impl fmt::Debug for IndexDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDefinition")
            .field("name", &self.name)
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

/// Materialization progress of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStatus {
    /// Index name.
    pub name: String,
    /// Whether writes exist that the index has not processed yet.
    pub is_stale: bool,
    /// Number of source documents with at least one entry.
    pub entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChangeVector, DocumentMetadata};
    use serde_json::json;
    use time::OffsetDateTime;

    struct FixedLoader(Option<Value>);

    impl DocumentLoader for FixedLoader {
        fn load(&mut self, _collection: &str, _id: &str) -> Option<Value> {
            self.0.clone()
        }
    }

    fn document(body: Value) -> StoredDocument {
        StoredDocument {
            id: "tokens/1".into(),
            collection: "tokens".into(),
            change_vector: ChangeVector::new("A:1-test"),
            body,
            metadata: DocumentMetadata::default(),
            last_modified: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_map_uses_loader() {
        let index = IndexDefinition::new("TokenIndex", "tokens", |doc, loader| {
            let status = doc
                .body
                .get("authorizationId")
                .and_then(Value::as_str)
                .and_then(|id| loader.load("authorizations", id))
                .and_then(|auth| auth.get("status").cloned())
                .unwrap_or(Value::Null);
            let mut entry = IndexEntry::new();
            entry.insert("authorizationStatus".into(), status);
            vec![entry]
        });

        let mut loader = FixedLoader(Some(json!({ "status": "revoked" })));
        let entries = index.map(
            &document(json!({ "authorizationId": "authorizations/1" })),
            &mut loader,
        );
        assert_eq!(entries[0]["authorizationStatus"], json!("revoked"));
        assert_eq!(index.name(), "TokenIndex");
        assert_eq!(index.collection(), "tokens");
    }

    #[test]
    fn test_debug_omits_map_function() {
        let index = IndexDefinition::new("ScopeIndex", "scopes", |_, _| Vec::new());
        let rendered = format!("{index:?}");
        assert!(rendered.contains("ScopeIndex"));
    }
}
