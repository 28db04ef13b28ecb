//! Document and write-batch types for the driver contract.
//!
//! This module defines the data exchanged between the persistence layer and a
//! document store: stored documents, version tokens, metadata and the commands
//! that make up an atomic write batch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use time::OffsetDateTime;

/// Opaque version token assigned by the store on every write.
///
/// Two documents loaded at different times compare equal only if nothing was
/// written to the document in between.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeVector(String);

impl ChangeVector {
    /// Wraps a raw change vector string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw change vector string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-level metadata kept next to a document body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Expiration hint. Drivers may sweep documents past this instant.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub expires: Option<OffsetDateTime>,
}

impl DocumentMetadata {
    /// Sets the expiration hint.
    #[must_use]
    pub fn with_expires(mut self, expires: Option<OffsetDateTime>) -> Self {
        self.expires = expires;
        self
    }
}

/// A document as returned by the store.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    /// The document key.
    pub id: String,
    /// The collection the document belongs to.
    pub collection: String,
    /// Version token captured at read time.
    pub change_vector: ChangeVector,
    /// The document body.
    pub body: Value,
    /// Store-level metadata.
    pub metadata: DocumentMetadata,
    /// When the document was last written.
    pub last_modified: OffsetDateTime,
}

/// Version expectation checked atomically when a batch commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteExpectation {
    /// No check.
    Any,
    /// The key must not exist yet.
    Absent,
    /// The stored change vector must equal this one.
    Version(ChangeVector),
}

/// Atomic modification of a list field, applied without a read-modify-write
/// round trip from the client.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOperation {
    /// Append `value` to the array at `field` unless it is already present.
    AddToSet {
        /// Top-level field holding an array.
        field: String,
        /// Value to append.
        value: Value,
    },
    /// Remove every occurrence of each of `values` from the array at `field`.
    Remove {
        /// Top-level field holding an array.
        field: String,
        /// Values to drop.
        values: Vec<Value>,
    },
}

impl PatchOperation {
    /// Creates an `AddToSet` patch.
    #[must_use]
    pub fn add_to_set(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::AddToSet {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a `Remove` patch for a single value.
    #[must_use]
    pub fn remove(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Remove {
            field: field.into(),
            values: vec![value.into()],
        }
    }

    /// Creates a `Remove` patch for several values at once.
    #[must_use]
    pub fn remove_all<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Remove {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the patched field name.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::AddToSet { field, .. } | Self::Remove { field, .. } => field,
        }
    }

    /// Applies the patch to a document body.
    ///
    /// A missing or null field is treated as an empty array. Returns `true` if
    /// the body changed. Bodies that are not objects, or fields holding a
    /// non-array value, are left untouched.
    pub fn apply(&self, body: &mut Value) -> bool {
        let Some(object) = body.as_object_mut() else {
            return false;
        };

        match self {
            Self::AddToSet { field, value } => {
                let slot = object
                    .entry(field.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if slot.is_null() {
                    *slot = Value::Array(Vec::new());
                }
                let Some(items) = slot.as_array_mut() else {
                    return false;
                };
                if items.contains(value) {
                    return false;
                }
                items.push(value.clone());
                true
            }
            Self::Remove { field, values } => {
                let Some(items) = object.get_mut(field).and_then(Value::as_array_mut) else {
                    return false;
                };
                let before = items.len();
                items.retain(|item| !values.contains(item));
                items.len() != before
            }
        }
    }
}

/// A value that at most one document may hold at a time.
///
/// Reservations are checked when the batch commits, so two concurrent
/// creates with the same value cannot both succeed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueConstraint {
    /// Fully qualified reservation key.
    pub key: String,
}

impl UniqueConstraint {
    /// Builds the reservation key for `value` of `field` in `collection`.
    #[must_use]
    pub fn new(collection: &str, field: &str, value: &str) -> Self {
        Self {
            key: format!("{collection}/{field}/{value}"),
        }
    }
}

/// A single command in a write batch.
#[derive(Debug, Clone)]
pub enum WriteCommand {
    /// Store a full document body.
    Put {
        /// Target collection.
        collection: String,
        /// Document key.
        id: String,
        /// New body.
        body: Value,
        /// Version check.
        expectation: WriteExpectation,
        /// Store-level metadata.
        metadata: DocumentMetadata,
        /// Values this document reserves. Replaces any previous reservations.
        unique: Vec<UniqueConstraint>,
    },
    /// Remove a document and release its reservations.
    Delete {
        /// Target collection.
        collection: String,
        /// Document key.
        id: String,
        /// Version check.
        expectation: WriteExpectation,
    },
    /// Apply a field patch. Patching a missing document is not an error.
    Patch {
        /// Target collection.
        collection: String,
        /// Document key.
        id: String,
        /// The modification.
        patch: PatchOperation,
    },
}

impl WriteCommand {
    /// Creates a `Put` command without metadata or reservations.
    #[must_use]
    pub fn put(
        collection: impl Into<String>,
        id: impl Into<String>,
        body: Value,
        expectation: WriteExpectation,
    ) -> Self {
        Self::Put {
            collection: collection.into(),
            id: id.into(),
            body,
            expectation,
            metadata: DocumentMetadata::default(),
            unique: Vec::new(),
        }
    }

    /// Creates a `Delete` command.
    #[must_use]
    pub fn delete(
        collection: impl Into<String>,
        id: impl Into<String>,
        expectation: WriteExpectation,
    ) -> Self {
        Self::Delete {
            collection: collection.into(),
            id: id.into(),
            expectation,
        }
    }

    /// Creates a `Patch` command.
    #[must_use]
    pub fn patch(collection: impl Into<String>, id: impl Into<String>, patch: PatchOperation) -> Self {
        Self::Patch {
            collection: collection.into(),
            id: id.into(),
            patch,
        }
    }

    /// Attaches metadata to a `Put`. Other commands are returned unchanged.
    #[must_use]
    pub fn with_metadata(mut self, value: DocumentMetadata) -> Self {
        if let Self::Put { metadata, .. } = &mut self {
            *metadata = value;
        }
        self
    }

    /// Attaches unique reservations to a `Put`. Other commands are returned unchanged.
    #[must_use]
    pub fn with_unique(mut self, constraints: Vec<UniqueConstraint>) -> Self {
        if let Self::Put { unique, .. } = &mut self {
            *unique = constraints;
        }
        self
    }

    /// Returns the target collection.
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::Put { collection, .. }
            | Self::Delete { collection, .. }
            | Self::Patch { collection, .. } => collection,
        }
    }

    /// Returns the target document key.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Put { id, .. } | Self::Delete { id, .. } | Self::Patch { id, .. } => id,
        }
    }
}

/// An ordered list of commands committed atomically.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    commands: Vec<WriteCommand>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command.
    pub fn push(&mut self, command: WriteCommand) {
        self.commands.push(command);
    }

    /// Returns the buffered commands.
    #[must_use]
    pub fn commands(&self) -> &[WriteCommand] {
        &self.commands
    }

    /// Consumes the batch, returning its commands.
    #[must_use]
    pub fn into_commands(self) -> Vec<WriteCommand> {
        self.commands
    }

    /// Returns the number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if the batch holds no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl FromIterator<WriteCommand> for WriteBatch {
    fn from_iter<T: IntoIterator<Item = WriteCommand>>(iter: T) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}

/// Result of a patch command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchStatus {
    /// The document changed and now carries this change vector.
    Patched(ChangeVector),
    /// The patch was a no-op on an existing document.
    NotModified,
    /// The target document does not exist.
    DocumentDoesNotExist,
}

/// Per-command result of a committed batch, in command order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A `Put` was stored.
    Stored {
        /// Collection written.
        collection: String,
        /// Document key.
        id: String,
        /// The new version token.
        change_vector: ChangeVector,
    },
    /// A `Delete` was processed.
    Deleted {
        /// Collection written.
        collection: String,
        /// Document key.
        id: String,
        /// Whether a document was actually removed.
        existed: bool,
    },
    /// A `Patch` was processed.
    Patched {
        /// Collection written.
        collection: String,
        /// Document key.
        id: String,
        /// What happened to the target.
        status: PatchStatus,
    },
}

impl CommitOutcome {
    /// Returns the new change vector when this outcome stored `id` in `collection`.
    #[must_use]
    pub fn stored_version(&self, collection: &str, id: &str) -> Option<&ChangeVector> {
        match self {
            Self::Stored {
                collection: c,
                id: i,
                change_vector,
            } if c == collection && i == id => Some(change_vector),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_to_set_creates_missing_field() {
        let mut body = json!({ "subject": "alice" });
        assert!(PatchOperation::add_to_set("tokens", "tokens/1").apply(&mut body));
        assert_eq!(body["tokens"], json!(["tokens/1"]));
    }

    #[test]
    fn test_add_to_set_is_idempotent() {
        let mut body = json!({ "tokens": ["tokens/1"] });
        assert!(!PatchOperation::add_to_set("tokens", "tokens/1").apply(&mut body));
        assert_eq!(body["tokens"], json!(["tokens/1"]));
    }

    #[test]
    fn test_add_to_set_replaces_null() {
        let mut body = json!({ "tokens": null });
        assert!(PatchOperation::add_to_set("tokens", "tokens/2").apply(&mut body));
        assert_eq!(body["tokens"], json!(["tokens/2"]));
    }

    #[test]
    fn test_remove_drops_every_occurrence() {
        let mut body = json!({ "tokens": ["tokens/1", "tokens/2", "tokens/1", "tokens/3"] });
        let patch = PatchOperation::remove_all("tokens", ["tokens/1", "tokens/3"]);
        assert!(patch.apply(&mut body));
        assert_eq!(body["tokens"], json!(["tokens/2"]));
    }

    #[test]
    fn test_remove_on_missing_field_is_noop() {
        let mut body = json!({});
        assert!(!PatchOperation::remove("tokens", "tokens/1").apply(&mut body));
        assert_eq!(body, json!({}));
    }

    #[test]
    fn test_patch_ignores_non_array_field() {
        let mut body = json!({ "tokens": "tokens/1" });
        assert!(!PatchOperation::add_to_set("tokens", "tokens/2").apply(&mut body));
        assert_eq!(body["tokens"], json!("tokens/1"));
    }

    #[test]
    fn test_unique_constraint_key() {
        let constraint = UniqueConstraint::new("scopes", "name", "profile");
        assert_eq!(constraint.key, "scopes/name/profile");
    }

    #[test]
    fn test_builder_helpers_only_touch_put() {
        let delete = WriteCommand::delete("tokens", "tokens/1", WriteExpectation::Any)
            .with_unique(vec![UniqueConstraint::new("tokens", "referenceId", "r")]);
        assert!(matches!(delete, WriteCommand::Delete { .. }));

        let put = WriteCommand::put("tokens", "tokens/1", json!({}), WriteExpectation::Absent)
            .with_metadata(DocumentMetadata::default().with_expires(Some(
                OffsetDateTime::UNIX_EPOCH,
            )));
        match put {
            WriteCommand::Put { metadata, .. } => {
                assert_eq!(metadata.expires, Some(OffsetDateTime::UNIX_EPOCH));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_stored_version_matches_target() {
        let outcome = CommitOutcome::Stored {
            collection: "scopes".into(),
            id: "scopes/1".into(),
            change_vector: ChangeVector::new("A:3-db"),
        };
        assert_eq!(
            outcome.stored_version("scopes", "scopes/1").map(ChangeVector::as_str),
            Some("A:3-db")
        );
        assert!(outcome.stored_version("scopes", "scopes/2").is_none());
    }
}
