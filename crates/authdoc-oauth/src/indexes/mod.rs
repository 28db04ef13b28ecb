//! Secondary index definitions.
//!
//! Every index is map-only: one flat entry per document, computed from the
//! document body (and, for tokens, the owning authorization). Stores use the
//! same projection to re-check matches against freshly loaded documents.

pub mod application;
pub mod authorization;
pub mod scope;
pub mod token;

use authdoc_storage::{DocumentStore, IndexDefinition, StorageResult, StoredDocument};
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{info, trace};

/// Definitions of every index the stores query.
#[must_use]
pub fn definitions() -> Vec<IndexDefinition> {
    vec![
        application::definition(),
        authorization::definition(),
        scope::definition(),
        token::definition(),
    ]
}

/// Registers every index with `store`. Already registered indexes are kept.
///
/// # Errors
///
/// Returns the first registration failure reported by the store.
pub async fn register_all(store: &dyn DocumentStore) -> StorageResult<()> {
    for definition in definitions() {
        let name = definition.name().to_owned();
        store.register_index(definition).await?;
        info!(index = %name, backend = store.backend_name(), "Registered index");
    }
    Ok(())
}

/// Decodes the base model an index projects from. Documents that do not
/// decode produce no entry.
pub(crate) fn decode<M: DeserializeOwned>(index: &str, document: &StoredDocument) -> Option<M> {
    match M::deserialize(&document.body) {
        Ok(model) => Some(model),
        Err(err) => {
            trace!(index, id = %document.id, error = %err, "Skipping undecodable document");
            None
        }
    }
}

pub(crate) fn text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, Value::from)
}

pub(crate) fn strings(values: &[String]) -> Value {
    Value::from(values.to_vec())
}

/// Index entries store dates as Unix nanoseconds.
pub(crate) fn timestamp(value: Option<OffsetDateTime>) -> Value {
    value.map_or(Value::Null, |date| Value::from(nanos(date)))
}

/// Saturates outside 1677-09-21..2262-04-11.
pub(crate) fn nanos(date: OffsetDateTime) -> i64 {
    let nanos = date.unix_timestamp_nanos();
    i64::try_from(nanos).unwrap_or(if nanos < 0 { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_timestamps_are_unix_nanos() {
        assert_eq!(timestamp(None), Value::Null);
        assert_eq!(
            timestamp(Some(datetime!(1970-01-01 00:00:01.5 UTC))),
            Value::from(1_500_000_000)
        );
        assert!(
            nanos(datetime!(2024-01-01 00:00:00.0001 UTC))
                < nanos(datetime!(2024-01-01 00:00:00.0009 UTC))
        );
    }

    #[test]
    fn test_timestamps_saturate_out_of_range() {
        assert_eq!(nanos(datetime!(2300-01-01 00:00 UTC)), i64::MAX);
        assert_eq!(nanos(datetime!(1600-01-01 00:00 UTC)), i64::MIN);
    }

    #[test]
    fn test_definitions_are_distinct() {
        let names: Vec<String> = definitions().iter().map(|d| d.name().to_owned()).collect();
        assert_eq!(
            names,
            ["ApplicationIndex", "AuthorizationIndex", "ScopeIndex", "TokenIndex"]
        );
    }
}
