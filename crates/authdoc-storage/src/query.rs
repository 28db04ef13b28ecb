//! Query types for the driver contract.
//!
//! A query reads either a whole collection or a named secondary index. Only
//! index queries accept a [`Filter`]; collection scans are limited to paging.

use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::StorageError;
use crate::StorageResult;

/// Predicate over the fields of an index entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals the value. A missing field equals `null`.
    Eq {
        /// Indexed field.
        field: String,
        /// Expected value.
        value: Value,
    },
    /// Negation of `Eq`.
    Ne {
        /// Indexed field.
        field: String,
        /// Rejected value.
        value: Value,
    },
    /// Field is strictly less than the value. Numbers compare numerically,
    /// strings lexically; any other pairing does not match.
    Lt {
        /// Indexed field.
        field: String,
        /// Upper bound.
        value: Value,
    },
    /// Field equals one of the values.
    In {
        /// Indexed field.
        field: String,
        /// Accepted values.
        values: Vec<Value>,
    },
    /// Array field contains the value.
    Contains {
        /// Indexed field.
        field: String,
        /// Expected element.
        value: Value,
    },
    /// Array field contains every value.
    ContainsAll {
        /// Indexed field.
        field: String,
        /// Required elements.
        values: Vec<Value>,
    },
    /// Array field contains at least one of the values.
    ContainsAny {
        /// Indexed field.
        field: String,
        /// Candidate elements.
        values: Vec<Value>,
    },
    /// Field is missing or `null`.
    IsNull {
        /// Indexed field.
        field: String,
    },
    /// All filters match.
    And(Vec<Filter>),
    /// At least one filter matches.
    Or(Vec<Filter>),
    /// The filter does not match.
    Not(Box<Filter>),
}

impl Filter {
    /// Creates an `Eq` filter.
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a `Ne` filter.
    #[must_use]
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Ne {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a `Lt` filter.
    #[must_use]
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates an `In` filter.
    #[must_use]
    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a `Contains` filter.
    #[must_use]
    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a `ContainsAll` filter.
    #[must_use]
    pub fn contains_all<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::ContainsAll {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a `ContainsAny` filter.
    #[must_use]
    pub fn contains_any<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::ContainsAny {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates an `IsNull` filter.
    #[must_use]
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull {
            field: field.into(),
        }
    }

    /// Combines filters with a logical AND.
    #[must_use]
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    /// Combines filters with a logical OR.
    #[must_use]
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    /// Negates a filter.
    #[must_use]
    pub fn not(filter: Filter) -> Self {
        Self::Not(Box::new(filter))
    }

    /// Evaluates the filter against an index entry.
    #[must_use]
    pub fn matches(&self, entry: &Map<String, Value>) -> bool {
        match self {
            Self::Eq { field, value } => field_value(entry, field) == value,
            Self::Ne { field, value } => field_value(entry, field) != value,
            Self::Lt { field, value } => less_than(field_value(entry, field), value),
            Self::In { field, values } => values.contains(field_value(entry, field)),
            Self::Contains { field, value } => elements(entry, field).any(|item| item == value),
            Self::ContainsAll { field, values } => values
                .iter()
                .all(|value| elements(entry, field).any(|item| item == value)),
            Self::ContainsAny { field, values } => {
                elements(entry, field).any(|item| values.contains(item))
            }
            Self::IsNull { field } => field_value(entry, field).is_null(),
            Self::And(filters) => filters.iter().all(|filter| filter.matches(entry)),
            Self::Or(filters) => filters.iter().any(|filter| filter.matches(entry)),
            Self::Not(filter) => !filter.matches(entry),
        }
    }
}

fn field_value<'a>(entry: &'a Map<String, Value>, field: &str) -> &'a Value {
    entry.get(field).unwrap_or(&Value::Null)
}

fn elements<'a>(entry: &'a Map<String, Value>, field: &str) -> impl Iterator<Item = &'a Value> {
    entry
        .get(field)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn less_than(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a < b,
            _ => match (a.as_f64(), b.as_f64()) {
                (Some(a), Some(b)) => a < b,
                _ => false,
            },
        },
        (Value::String(a), Value::String(b)) => a < b,
        _ => false,
    }
}

/// What a query reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuerySource {
    /// Every document of a collection, in the store's default order.
    Collection(String),
    /// Documents whose entries in the named index match the filter.
    Index(String),
}

/// Per-query execution options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Wait up to this long for the index to catch up with all writes
    /// committed before the query started.
    pub wait_for_non_stale: Option<Duration>,
    /// Number of documents the cursor fetches per round trip.
    pub page_size: Option<usize>,
}

/// A query against a document store.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    /// What the query reads from.
    pub source: QuerySource,
    /// Index filter. Must be `None` for collection scans.
    pub filter: Option<Filter>,
    /// Number of results to skip.
    pub skip: Option<usize>,
    /// Maximum number of results.
    pub take: Option<usize>,
    /// Execution options.
    pub options: QueryOptions,
}

impl DocumentQuery {
    /// Creates a scan over a whole collection.
    #[must_use]
    pub fn collection(name: impl Into<String>) -> Self {
        Self::from_source(QuerySource::Collection(name.into()))
    }

    /// Creates a query against a named index.
    #[must_use]
    pub fn index(name: impl Into<String>) -> Self {
        Self::from_source(QuerySource::Index(name.into()))
    }

    fn from_source(source: QuerySource) -> Self {
        Self {
            source,
            filter: None,
            skip: None,
            take: None,
            options: QueryOptions::default(),
        }
    }

    /// Sets the index filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the number of results to skip.
    #[must_use]
    pub fn skip(mut self, skip: Option<usize>) -> Self {
        self.skip = skip;
        self
    }

    /// Sets the maximum number of results.
    #[must_use]
    pub fn take(mut self, take: Option<usize>) -> Self {
        self.take = take;
        self
    }

    /// Waits for the index to become non-stale before running.
    #[must_use]
    pub fn wait_for_non_stale(mut self, timeout: Option<Duration>) -> Self {
        self.options.wait_for_non_stale = timeout;
        self
    }

    /// Sets the cursor page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.options.page_size = Some(page_size);
        self
    }

    /// Checks the query is executable.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidQuery` for a filtered collection scan or a
    /// zero page size.
    pub fn validate(&self) -> StorageResult<()> {
        if matches!(self.source, QuerySource::Collection(_)) && self.filter.is_some() {
            return Err(StorageError::invalid_query(
                "collection scans cannot be filtered; query an index instead",
            ));
        }
        if self.options.page_size == Some(0) {
            return Err(StorageError::invalid_query("page size must be positive"));
        }
        Ok(())
    }
}
