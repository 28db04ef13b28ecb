//! Token pruning.
//!
//! Pruning is one set-based delete on `TokenIndex`, run inside the store.
//! The deleted keys are then removed from their authorizations' `tokens`
//! lists with one set-based patch on `AuthorizationIndex`. A failure in that
//! second step is reported with the number of tokens already deleted.

use authdoc_storage::{BulkOptions, DocumentQuery, Filter, PatchOperation};
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use crate::StoreResult;
use crate::error::StoreError;
use crate::indexes::{self, authorization, token};
use crate::models::statuses;
use crate::session::Session;

/// Outcome of a prune run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneResult {
    /// Tokens deleted.
    pub deleted: u64,
    /// Authorizations whose token list was cleaned up.
    pub detached: u64,
}

/// Matches tokens created before `threshold` that can no longer be used.
///
/// A token qualifies when its own status is neither `inactive` nor `valid`,
/// or when it belongs to an authorization that is not `valid`. A token whose
/// authorization no longer exists counts as the latter. Tokens without a
/// creation date never qualify.
#[must_use]
pub fn prune_filter(threshold: OffsetDateTime) -> Filter {
    use token::fields::{AUTHORIZATION_ID, AUTHORIZATION_STATUS, CREATION_DATE, STATUS};

    Filter::and([
        Filter::lt(CREATION_DATE, indexes::nanos(threshold)),
        Filter::or([
            Filter::not(Filter::is_in(STATUS, [statuses::INACTIVE, statuses::VALID])),
            Filter::and([
                Filter::not(Filter::is_null(AUTHORIZATION_ID)),
                Filter::ne(AUTHORIZATION_STATUS, statuses::VALID),
            ]),
        ]),
    ])
}

#[instrument(skip(session), fields(threshold = %threshold))]
pub(crate) async fn prune_tokens(
    session: &Session,
    threshold: OffsetDateTime,
) -> StoreResult<PruneResult> {
    let config = &session.config().prune;
    let store = session.store();

    let query = DocumentQuery::index(token::NAME)
        .with_filter(prune_filter(threshold))
        .wait_for_non_stale(config.stale_timeout);
    let options = BulkOptions {
        retrieve_details: config.detach_references,
        batch_size: Some(config.batch_size),
    };

    let operation = session.run(store.delete_by_query(query, options)).await?;
    debug!(operation = operation.id(), "Started token prune");
    let deleted = session.run(operation.wait_for_completion()).await?;

    let mut result = PruneResult {
        deleted: deleted.total,
        detached: 0,
    };

    if config.detach_references && !deleted.details.is_empty() {
        let completed = result.deleted;
        result.detached = detach(session, deleted.details).await.map_err(|err| {
            warn!(deleted = completed, error = %err, "Detaching pruned tokens failed");
            StoreError::Operation {
                completed,
                message: format!("pruned tokens could not be detached: {err}"),
            }
        })?;
    }

    info!(
        deleted = result.deleted,
        detached = result.detached,
        "Pruned tokens"
    );
    Ok(result)
}

/// Removes `ids` from every authorization `tokens` list holding one of them.
///
/// Waits for `AuthorizationIndex` to reflect every earlier write, so that
/// owners patched just before the prune are still matched.
async fn detach(session: &Session, ids: Vec<String>) -> StoreResult<u64> {
    let config = &session.config().prune;
    let query = DocumentQuery::index(authorization::NAME)
        .with_filter(Filter::contains_any(
            authorization::fields::TOKENS,
            ids.iter().map(String::as_str),
        ))
        .wait_for_non_stale(Some(config.detach_timeout));
    let patch = PatchOperation::remove_all(authorization::fields::TOKENS, ids);
    let options = BulkOptions::default().with_batch_size(config.batch_size);

    let operation = session
        .run(session.store().patch_by_query(query, patch, options))
        .await?;
    Ok(session.run(operation.wait_for_completion()).await?.total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use time::macros::datetime;

    fn entry(value: Value) -> serde_json::Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_filter_selects_unusable_old_tokens() {
        let threshold = datetime!(2024-01-02 00:00 UTC);
        let old = indexes::nanos(datetime!(2024-01-01 00:00 UTC));
        let new = indexes::nanos(datetime!(2024-01-03 00:00 UTC));
        let filter = prune_filter(threshold);

        assert!(filter.matches(&entry(json!({ "creationDate": old, "status": "redeemed" }))));
        assert!(filter.matches(&entry(json!({ "creationDate": old, "status": "revoked" }))));
        assert!(!filter.matches(&entry(json!({ "creationDate": new, "status": "revoked" }))));
        assert!(!filter.matches(&entry(json!({ "creationDate": old, "status": "valid" }))));
        assert!(!filter.matches(&entry(json!({ "status": "revoked" }))));
    }

    #[test]
    fn test_filter_compares_below_a_millisecond() {
        let filter = prune_filter(datetime!(2024-01-01 00:00:00.0009 UTC));
        let just_before = indexes::nanos(datetime!(2024-01-01 00:00:00.0001 UTC));
        let exactly = indexes::nanos(datetime!(2024-01-01 00:00:00.0009 UTC));

        let before = entry(json!({ "creationDate": just_before, "status": "redeemed" }));
        let at = entry(json!({ "creationDate": exactly, "status": "redeemed" }));
        assert!(filter.matches(&before));
        assert!(!filter.matches(&at));
    }

    #[test]
    fn test_filter_follows_authorization_status() {
        let filter = prune_filter(datetime!(2024-01-02 00:00 UTC));
        let old = indexes::nanos(datetime!(2024-01-01 00:00 UTC));

        let revoked_owner = json!({
            "creationDate": old,
            "status": "valid",
            "authorizationId": "authorizations/1",
            "authorizationStatus": "revoked"
        });
        let dangling_owner = json!({
            "creationDate": old,
            "status": "inactive",
            "authorizationId": "authorizations/gone",
            "authorizationStatus": null
        });
        let valid_owner = json!({
            "creationDate": old,
            "status": "valid",
            "authorizationId": "authorizations/2",
            "authorizationStatus": "valid"
        });

        assert!(filter.matches(&entry(revoked_owner)));
        assert!(filter.matches(&entry(dangling_owner)));
        assert!(!filter.matches(&entry(valid_owner)));
    }
}
