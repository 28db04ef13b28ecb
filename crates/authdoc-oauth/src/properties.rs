//! Property-bag codec.
//!
//! Entities carry free-form extension properties as a JSON object. Callers
//! work with them as a [`PropertyBag`]; null values are never stored.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// Extension properties keyed by name.
pub type PropertyBag = HashMap<String, Value>;

/// Decodes stored properties into a bag.
#[must_use]
pub fn decode(stored: &Map<String, Value>) -> PropertyBag {
    stored
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Encodes a bag for storage, dropping null values.
#[must_use]
pub fn encode(bag: PropertyBag) -> Map<String, Value> {
    bag.into_iter().filter(|(_, value)| !value.is_null()).collect()
}

/// Reads a single property.
#[must_use]
pub fn get<'a>(stored: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    stored.get(name).filter(|value| !value.is_null())
}

/// Writes a single property. `None` or `null` removes it.
pub fn set(stored: &mut Map<String, Value>, name: impl Into<String>, value: Option<Value>) {
    let name = name.into();
    match value {
        Some(value) if !value.is_null() => {
            stored.insert(name, value);
        }
        _ => {
            stored.remove(&name);
        }
    }
}
