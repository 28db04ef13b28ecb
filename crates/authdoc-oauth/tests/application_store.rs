//! Application store integration tests.
//!
//! Covers CRUD round trips, index-backed finders (including convergence of
//! lagging indexes), pagination and the property-bag accessors.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use authdoc_oauth::models::{client_types, consent_types};
use authdoc_oauth::prelude::*;
use common::Harness;
use futures_util::StreamExt;
use serde_json::json;

fn portal() -> Application {
    let mut application = Application::with_client_id("portal");
    application.client_type = Some(client_types::CONFIDENTIAL.into());
    application.consent_type = Some(consent_types::EXPLICIT.into());
    application.display_name = Some("Portal".into());
    application.display_names = [("fr-FR".to_owned(), "Portail".to_owned())].into();
    application.redirect_uris = vec![
        "https://portal.example/callback".into(),
        "https://portal.example/alt".into(),
    ];
    application.post_logout_redirect_uris = vec!["https://portal.example/bye".into()];
    application.permissions = vec!["ept:token".into(), "gt:authorization_code".into()];
    application.requirements = vec!["ft:pkce".into()];
    application
        .properties
        .insert("tier".into(), json!({ "name": "gold", "seats": 25 }));
    application
}

// =============================================================================
// CRUD
// =============================================================================

#[tokio::test]
async fn create_then_find_by_id_round_trips_every_field() {
    let harness = Harness::new().await;
    let applications = harness.session().applications();

    let mut application = portal();
    applications.create(&mut application).await.expect("create");
    let id = application.id.clone().expect("key assigned");
    assert!(id.starts_with("applications/"));

    let loaded = applications
        .find_by_id(&id)
        .await
        .expect("find")
        .expect("application exists");
    assert_eq!(loaded, application);
}

#[tokio::test]
async fn create_keeps_a_caller_assigned_key() {
    let harness = Harness::new().await;
    let applications = harness.session().applications();

    let mut application = portal();
    application.id = Some("applications/portal".into());
    applications.create(&mut application).await.expect("create");

    assert_eq!(application.id.as_deref(), Some("applications/portal"));
    assert_eq!(applications.count().await.expect("count"), 1);
}

#[tokio::test]
async fn duplicate_client_id_is_a_conflict() {
    let harness = Harness::new().await;
    let applications = harness.session().applications();

    applications.create(&mut portal()).await.expect("first create");
    let err = applications
        .create(&mut portal())
        .await
        .expect_err("second create must fail");
    assert!(err.is_conflict(), "unexpected error: {err}");
    assert_eq!(applications.count().await.expect("count"), 1);
}

#[tokio::test]
async fn update_persists_changes() {
    let harness = Harness::new().await;
    let applications = harness.session().applications();

    let mut application = portal();
    applications.create(&mut application).await.expect("create");
    let created_version = application.change_vector().cloned();

    application.display_name = Some("Portal v2".into());
    applications.update(&mut application).await.expect("update");
    assert_ne!(application.change_vector().cloned(), created_version);

    let loaded = applications
        .find_by_id(application.id.as_deref().expect("key"))
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(loaded.display_name.as_deref(), Some("Portal v2"));
}

#[tokio::test]
async fn delete_removes_the_document() {
    let harness = Harness::new().await;
    let applications = harness.session().applications();

    let mut application = portal();
    applications.create(&mut application).await.expect("create");
    applications.delete(&application).await.expect("delete");

    let id = application.id.as_deref().expect("key");
    assert!(applications.find_by_id(id).await.expect("find").is_none());
    assert_eq!(applications.count().await.expect("count"), 0);
}

#[tokio::test]
async fn deleting_a_never_loaded_entity_is_rejected() {
    let harness = Harness::new().await;
    let applications = harness.session().applications();

    let err = applications
        .delete(&portal())
        .await
        .expect_err("delete without a key");
    assert!(err.is_invalid_argument());
}

#[tokio::test]
async fn empty_keys_are_rejected() {
    let harness = Harness::new().await;
    let applications = harness.session().applications();

    assert!(applications.find_by_id("").await.unwrap_err().is_invalid_argument());
    assert!(
        applications
            .find_by_client_id("")
            .await
            .unwrap_err()
            .is_invalid_argument()
    );
    assert!(applications.find_by_redirect_uri("").unwrap_err().is_invalid_argument());
}

#[tokio::test]
async fn find_by_id_of_missing_document_is_none() {
    let harness = Harness::new().await;
    let applications = harness.session().applications();

    let found = applications.find_by_id("applications/missing").await.expect("find");
    assert!(found.is_none());
}

// =============================================================================
// Index-backed finders
// =============================================================================

#[tokio::test]
async fn find_by_client_id_converges_after_indexing() {
    let harness = Harness::lagging(Duration::from_millis(50)).await;
    let applications = harness.session().applications();

    let mut other = Application::with_client_id("other");
    applications.create(&mut other).await.expect("create other");
    let mut application = Application::with_client_id("c1");
    applications.create(&mut application).await.expect("create c1");

    let mut found = None;
    for _ in 0..100 {
        if let Some(hit) = applications.find_by_client_id("c1").await.expect("find") {
            found = Some(hit);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let found = found.expect("index converged");
    assert_eq!(found.id, application.id);
    assert_eq!(found.client_id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn find_by_client_id_never_returns_a_stale_match() {
    let harness = Harness::lagging(Duration::from_millis(200)).await;
    let applications = harness.session().applications();

    let mut application = Application::with_client_id("c1");
    applications.create(&mut application).await.expect("create");
    harness.settle().await;

    application.client_id = Some("c2".into());
    applications.update(&mut application).await.expect("update");

    // The index still maps "c1" to the document until it catches up.
    assert!(applications.find_by_client_id("c1").await.expect("find").is_none());

    harness.settle().await;
    let found = applications
        .find_by_client_id("c2")
        .await
        .expect("find")
        .expect("renamed application");
    assert_eq!(found.id, application.id);
}

#[tokio::test]
async fn redirect_uri_finders_match_list_elements() {
    let harness = Harness::new().await;
    let applications = harness.session().applications();

    let mut application = portal();
    applications.create(&mut application).await.expect("create");
    let mut unrelated = Application::with_client_id("cli");
    unrelated.redirect_uris = vec!["http://localhost:7890".into()];
    applications.create(&mut unrelated).await.expect("create");
    harness.settle().await;

    let hits = applications
        .find_by_redirect_uri("https://portal.example/alt")
        .expect("query")
        .try_collect_vec()
        .await
        .expect("stream");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, application.id);

    let hits = applications
        .find_by_post_logout_redirect_uri("https://portal.example/bye")
        .expect("query")
        .try_collect_vec()
        .await
        .expect("stream");
    assert_eq!(hits.len(), 1);

    let hits = applications
        .find_by_redirect_uri("https://nowhere.example")
        .expect("query")
        .try_collect_vec()
        .await
        .expect("stream");
    assert!(hits.is_empty());
}

// =============================================================================
// Pagination and projections
// =============================================================================

async fn seed(harness: &Harness, count: usize) -> Vec<String> {
    let applications = harness.session().applications();
    let mut ids = Vec::new();
    for n in 1..=count {
        let mut application = Application::with_client_id(format!("client-{n}"));
        application.id = Some(format!("applications/{n}"));
        applications.create(&mut application).await.expect("create");
        ids.push(application.id.expect("key"));
    }
    ids
}

#[tokio::test]
async fn list_pages_in_default_order() {
    let harness = Harness::new().await;
    let ids = seed(&harness, 5).await;
    let applications = harness.session().applications();

    let page = |applications: &DocumentApplicationStore| {
        applications.list(Some(2), Some(1)).try_collect_vec()
    };
    let first: Vec<_> = page(&applications)
        .await
        .expect("page")
        .into_iter()
        .filter_map(|application| application.id)
        .collect();
    assert_eq!(first, ids[1..3]);

    let again: Vec<_> = page(&applications)
        .await
        .expect("page")
        .into_iter()
        .filter_map(|application| application.id)
        .collect();
    assert_eq!(again, first);

    let everything = applications.list(None, None).try_collect_vec().await.expect("all");
    assert_eq!(everything.len(), 5);
}

#[tokio::test]
async fn projections_run_over_every_entity() {
    let harness = Harness::new().await;
    seed(&harness, 4).await;
    let applications = harness.session().applications();

    let counted = applications
        .count_with(|stream| {
            stream
                .filter(|result| {
                    let keep = result
                        .as_ref()
                        .map(|application| application.client_id.as_deref() != Some("client-2"))
                        .unwrap_or(true);
                    async move { keep }
                })
                .boxed()
        })
        .await
        .expect("count");
    assert_eq!(counted, 3);

    let client_id = applications
        .get_with("client-3".to_owned(), |stream, wanted| {
            stream
                .filter_map(move |result| {
                    let hit = match result {
                        Ok(application) if application.client_id.as_deref() == Some(wanted.as_str()) => {
                            Some(Ok(application.client_id.unwrap_or_default()))
                        }
                        Ok(_) => None,
                        Err(err) => Some(Err(err)),
                    };
                    async move { hit }
                })
                .boxed()
        })
        .await
        .expect("get");
    assert_eq!(client_id.as_deref(), Some("client-3"));

    let names: Vec<String> = applications
        .list_with(2usize, |stream, take| {
            stream
                .take(take)
                .map(|result| result.map(|application| application.client_id.unwrap_or_default()))
                .boxed()
        })
        .map(|result| result.expect("row"))
        .collect()
        .await;
    assert_eq!(names, ["client-1", "client-2"]);
}

// =============================================================================
// Property bag
// =============================================================================

#[tokio::test]
async fn property_bag_round_trips_through_the_store() {
    let harness = Harness::new().await;
    let applications = harness.session().applications();

    let mut application = applications.instantiate().expect("instantiate");
    application.client_id = Some("bag".into());
    let bag = HashMap::from([
        ("flag".to_owned(), json!(true)),
        ("limits".to_owned(), json!({ "rps": 10, "burst": [1, 2, 3] })),
        ("dropped".to_owned(), json!(null)),
    ]);
    applications.set_properties(&mut application, bag);
    applications.create(&mut application).await.expect("create");

    let loaded = applications
        .find_by_id(application.id.as_deref().expect("key"))
        .await
        .expect("find")
        .expect("exists");
    let properties = applications.get_properties(&loaded);
    assert_eq!(properties.len(), 2);
    assert_eq!(properties["flag"], json!(true));
    assert_eq!(properties["limits"]["burst"], json!([1, 2, 3]));
}
