//! Token pruning.

mod common;

use std::sync::Arc;
use std::time::Duration;

use authdoc_db_memory::{InMemoryDocumentStore, StorageOptions};
use authdoc_oauth::indexes;
use authdoc_oauth::models::statuses;
use authdoc_oauth::prelude::*;
use authdoc_storage::DocumentStore;
use common::Harness;
use time::OffsetDateTime;
use time::macros::datetime;

const BEFORE: OffsetDateTime = datetime!(2024-01-01 00:00 UTC);
const THRESHOLD: OffsetDateTime = datetime!(2024-02-01 00:00 UTC);
const AFTER: OffsetDateTime = datetime!(2024-03-01 00:00 UTC);

fn waiting_config() -> StoreConfig {
    let mut config = StoreConfig::default();
    config.prune.stale_timeout = Some(Duration::from_secs(5));
    config.prune.batch_size = 2;
    config
}

async fn authorization(session: &Session, status: &str) -> Authorization {
    let mut authorization = Authorization {
        subject: Some("alice".into()),
        application_id: Some("applications/1".into()),
        status: Some(status.into()),
        creation_date: Some(BEFORE),
        ..Authorization::default()
    };
    session
        .authorizations()
        .create(&mut authorization)
        .await
        .expect("create authorization");
    authorization
}

async fn token(
    session: &Session,
    status: &str,
    created: OffsetDateTime,
    owner: Option<&str>,
) -> String {
    let mut token = Token {
        subject: Some("alice".into()),
        application_id: Some("applications/1".into()),
        authorization_id: owner.map(str::to_owned),
        status: Some(status.into()),
        creation_date: Some(created),
        ..Token::default()
    };
    session.tokens().create(&mut token).await.expect("create token");
    token.id.expect("key")
}

async fn exists(session: &Session, id: &str) -> bool {
    session.tokens().find_by_id(id).await.expect("find").is_some()
}

#[tokio::test]
async fn prunes_only_old_unusable_tokens() {
    let harness = Harness::with(StorageOptions::default(), waiting_config()).await;
    let session = harness.session();
    let owner = authorization(&session, statuses::VALID).await;
    let owner = owner.id.as_deref();

    let t1 = token(&session, "expired", BEFORE, owner).await;
    let t2 = token(&session, statuses::VALID, BEFORE, owner).await;
    let t3 = token(&session, "expired", AFTER, owner).await;

    let result = session.tokens().prune(THRESHOLD).await.expect("prune");
    assert_eq!(result.deleted, 1);

    assert!(!exists(&session, &t1).await);
    assert!(exists(&session, &t2).await);
    assert!(exists(&session, &t3).await);
}

#[tokio::test]
async fn threshold_is_compared_below_a_millisecond() {
    let harness = Harness::with(StorageOptions::default(), waiting_config()).await;
    let session = harness.session();

    let created = datetime!(2024-01-01 00:00:00.0001 UTC);
    let threshold = datetime!(2024-01-01 00:00:00.0009 UTC);
    let early = token(&session, statuses::REDEEMED, created, None).await;
    let on_time = token(&session, statuses::REDEEMED, threshold, None).await;

    let result = session.tokens().prune(threshold).await.expect("prune");
    assert_eq!(result.deleted, 1);
    assert!(!exists(&session, &early).await);
    assert!(exists(&session, &on_time).await);
}

#[tokio::test]
async fn inactive_and_valid_tokens_survive_under_a_valid_authorization() {
    let harness = Harness::with(StorageOptions::default(), waiting_config()).await;
    let session = harness.session();
    let owner = authorization(&session, statuses::VALID).await;
    let owner = owner.id.as_deref();

    let inactive = token(&session, statuses::INACTIVE, BEFORE, owner).await;
    let redeemed = token(&session, statuses::REDEEMED, BEFORE, owner).await;
    let rejected = token(&session, statuses::REJECTED, BEFORE, None).await;

    let result = session.tokens().prune(THRESHOLD).await.expect("prune");
    assert_eq!(result.deleted, 2);
    assert!(exists(&session, &inactive).await);
    assert!(!exists(&session, &redeemed).await);
    assert!(!exists(&session, &rejected).await);
}

#[tokio::test]
async fn tokens_of_a_revoked_authorization_are_pruned() {
    let harness = Harness::with(StorageOptions::default(), waiting_config()).await;
    let session = harness.session();
    let mut owner = authorization(&session, statuses::VALID).await;
    let owner_id = owner.id.clone().expect("key");

    let valid = token(&session, statuses::VALID, BEFORE, Some(&owner_id)).await;
    let unowned = token(&session, statuses::VALID, BEFORE, None).await;

    // Reload: the token write patched the authorization.
    let authorizations = session.authorizations();
    owner = authorizations
        .find_by_id(&owner_id)
        .await
        .expect("find")
        .expect("exists");
    owner.status = Some(statuses::REVOKED.into());
    authorizations.update(&mut owner).await.expect("revoke");

    let result = session.tokens().prune(THRESHOLD).await.expect("prune");
    assert_eq!(result.deleted, 1);
    assert!(!exists(&session, &valid).await);
    assert!(exists(&session, &unowned).await);
}

#[tokio::test]
async fn tokens_of_a_vanished_authorization_are_pruned() {
    let harness = Harness::with(StorageOptions::default(), waiting_config()).await;
    let session = harness.session();

    let dangling = token(&session, statuses::VALID, BEFORE, Some("authorizations/gone")).await;

    let result = session.tokens().prune(THRESHOLD).await.expect("prune");
    assert_eq!(result.deleted, 1);
    assert!(!exists(&session, &dangling).await);
}

#[tokio::test]
async fn pruned_tokens_are_detached_from_their_authorizations() {
    let harness = Harness::with(StorageOptions::default(), waiting_config()).await;
    let session = harness.session();
    let owner = authorization(&session, statuses::VALID).await;
    let owner_id = owner.id.clone().expect("key");

    let mut expired = Vec::new();
    for _ in 0..3 {
        expired.push(token(&session, statuses::REVOKED, BEFORE, Some(&owner_id)).await);
    }
    let kept = token(&session, statuses::VALID, BEFORE, Some(&owner_id)).await;

    let result = session.tokens().prune(THRESHOLD).await.expect("prune");
    assert_eq!(result, PruneResult { deleted: 3, detached: 1 });

    let stored = session
        .authorizations()
        .find_by_id(&owner_id)
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(stored.tokens, [kept]);
}

#[tokio::test]
async fn detaching_can_be_disabled() {
    let mut config = waiting_config();
    config.prune.detach_references = false;
    let harness = Harness::with(StorageOptions::default(), config).await;
    let session = harness.session();
    let owner = authorization(&session, statuses::VALID).await;
    let owner_id = owner.id.clone().expect("key");

    let expired = token(&session, statuses::REVOKED, BEFORE, Some(&owner_id)).await;

    let result = session.tokens().prune(THRESHOLD).await.expect("prune");
    assert_eq!(result, PruneResult { deleted: 1, detached: 0 });

    let stored = session
        .authorizations()
        .find_by_id(&owner_id)
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(stored.tokens, [expired]);
}

#[tokio::test]
async fn detaching_waits_for_a_lagging_authorization_index() {
    let memory = Arc::new(InMemoryDocumentStore::with_options(
        StorageOptions::default().with_indexing_delay(Duration::from_millis(100)),
    ));
    memory
        .register_index(indexes::token::definition())
        .await
        .expect("register token index");
    let stores = AuthStores::new(memory.clone(), StoreConfig::default());
    let session = stores.open_session();

    let owner = authorization(&session, statuses::VALID).await;
    let owner_id = owner.id.clone().expect("key");
    token(&session, statuses::REVOKED, BEFORE, Some(&owner_id)).await;
    assert!(memory.wait_for_indexing(Duration::from_secs(5)).await);

    // Built only after the indexing delay, so it is stale when pruning starts.
    memory
        .register_index(indexes::authorization::definition())
        .await
        .expect("register authorization index");

    let result = session.tokens().prune(THRESHOLD).await.expect("prune");
    assert_eq!(result, PruneResult { deleted: 1, detached: 1 });

    let stored = session
        .authorizations()
        .find_by_id(&owner_id)
        .await
        .expect("find")
        .expect("exists");
    assert!(stored.tokens.is_empty());
}

#[tokio::test]
async fn failed_detach_reports_the_deleted_tokens() {
    let memory = Arc::new(InMemoryDocumentStore::new());
    memory
        .register_index(indexes::token::definition())
        .await
        .expect("register token index");
    let stores = AuthStores::new(memory, waiting_config());
    let session = stores.open_session();

    let old = token(&session, statuses::REVOKED, BEFORE, None).await;

    let err = session.tokens().prune(THRESHOLD).await.expect_err("detach fails");
    assert!(
        matches!(err, StoreError::Operation { completed: 1, .. }),
        "unexpected error: {err}"
    );
    assert_eq!(err.category(), ErrorCategory::Operation);
    assert!(!exists(&session, &old).await);
}

#[tokio::test]
async fn prune_without_waiting_sees_the_settled_index() {
    let harness = Harness::new().await;
    let session = harness.session();
    let old = token(&session, statuses::REVOKED, BEFORE, None).await;
    harness.settle().await;

    let result = session.tokens().prune(THRESHOLD).await.expect("prune");
    assert_eq!(result.deleted, 1);
    assert!(!exists(&session, &old).await);
}

#[tokio::test]
async fn prune_with_nothing_to_do() {
    let harness = Harness::with(StorageOptions::default(), waiting_config()).await;
    let result = harness
        .session()
        .tokens()
        .prune(THRESHOLD)
        .await
        .expect("prune");
    assert_eq!(result, PruneResult::default());
}

#[tokio::test]
async fn prune_fails_without_registered_indexes() {
    let memory = Arc::new(InMemoryDocumentStore::new());
    let stores = AuthStores::new(memory, StoreConfig::default());

    let err = stores
        .open_session()
        .tokens()
        .prune(THRESHOLD)
        .await
        .expect_err("index missing");
    assert!(
        matches!(&err, StoreError::Storage(storage) if storage.is_index_not_found()),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn cancelled_prune_reports_cancellation() {
    let harness = Harness::with(StorageOptions::default(), waiting_config()).await;
    let session = harness.session();
    let old = token(&session, statuses::REVOKED, BEFORE, None).await;

    session.cancel();
    let err = session.tokens().prune(THRESHOLD).await.expect_err("cancelled");
    assert!(err.is_cancelled());

    let fresh = harness.session();
    assert!(exists(&fresh, &old).await);
}
