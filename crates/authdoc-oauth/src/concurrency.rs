//! Optimistic concurrency.
//!
//! Entities remember the change vector of their last read or write. Updates
//! and deletes send it as a version expectation; the store rejects the whole
//! batch when the document moved on. Nothing is retried here.

use authdoc_storage::{CommitOutcome, StorageError, WriteExpectation};

use crate::error::StoreError;
use crate::models::Document;
use crate::StoreResult;

/// Returns the key and version expectation for writing over `model`.
///
/// # Errors
///
/// Returns `StoreError::InvalidArgument` if the entity was never loaded or
/// persisted.
pub(crate) fn expect_current<D: Document>(model: &D) -> StoreResult<(String, WriteExpectation)> {
    let id = model
        .id()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| StoreError::invalid_argument("entity", format!("the {} has no key", D::KIND)))?;
    let version = model.change_vector().ok_or_else(|| {
        StoreError::invalid_argument(
            "entity",
            format!("the {} {id} was not loaded from the store", D::KIND),
        )
    })?;
    Ok((id.to_owned(), WriteExpectation::Version(version.clone())))
}

/// Records the change vector the commit assigned to `model`.
///
/// # Errors
///
/// Returns `StoreError::Storage` if the commit did not report a version for
/// the document.
pub(crate) fn stamp<D: Document>(model: &mut D, outcomes: &[CommitOutcome]) -> StoreResult<()> {
    let id = model.id().unwrap_or_default().to_owned();
    let version = outcomes
        .iter()
        .find_map(|outcome| outcome.stored_version(D::COLLECTION, &id))
        .cloned()
        .ok_or_else(|| {
            StoreError::Storage(StorageError::internal(format!(
                "commit did not report a version for {}/{id}",
                D::COLLECTION
            )))
        })?;
    model.mark_persisted(version);
    Ok(())
}
