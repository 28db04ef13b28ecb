//! Shared harness for the store integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use authdoc_db_memory::{InMemoryDocumentStore, StorageOptions};
use authdoc_oauth::{AuthStores, Session, StoreConfig};

pub struct Harness {
    pub memory: Arc<InMemoryDocumentStore>,
    pub stores: AuthStores,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(StorageOptions::default(), StoreConfig::default()).await
    }

    pub async fn with(options: StorageOptions, config: StoreConfig) -> Self {
        let memory = Arc::new(InMemoryDocumentStore::with_options(options));
        let stores = AuthStores::new(memory.clone(), config);
        stores.ensure_indexes().await.expect("register indexes");
        Self { memory, stores }
    }

    /// A store whose indexes lag every write by `delay`.
    pub async fn lagging(delay: Duration) -> Self {
        Self::with(
            StorageOptions::default().with_indexing_delay(delay),
            StoreConfig::default(),
        )
        .await
    }

    pub fn session(&self) -> Session {
        self.stores.open_session()
    }

    /// Blocks until every index has caught up with all committed writes.
    pub async fn settle(&self) {
        assert!(
            self.memory.wait_for_indexing(Duration::from_secs(5)).await,
            "indexes did not converge"
        );
    }
}
