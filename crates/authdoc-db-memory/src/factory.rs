use std::sync::Arc;
use std::time::Duration;

use authdoc_storage::DynDocumentStore;

use crate::InMemoryDocumentStore;

/// Supported storage backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-memory store implemented on top of papaya::HashMap
    InMemoryPapaya,
}

/// Storage-specific configuration options.
#[derive(Debug, Clone)]
pub struct StorageOptions {
    /// Artificial delay before an index worker processes new writes. Useful to
    /// exercise stale index reads in tests.
    pub indexing_delay: Option<Duration>,
    /// Documents fetched per cursor page unless the query overrides it.
    pub stream_page_size: usize,
    /// Documents deleted or patched per commit during set-based operations.
    pub bulk_batch_size: usize,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            indexing_delay: None,
            stream_page_size: 256,
            bulk_batch_size: 128,
        }
    }
}

impl StorageOptions {
    /// Sets the artificial indexing delay.
    #[must_use]
    pub fn with_indexing_delay(mut self, delay: Duration) -> Self {
        self.indexing_delay = Some(delay);
        self
    }

    /// Sets the default cursor page size.
    #[must_use]
    pub fn with_stream_page_size(mut self, page_size: usize) -> Self {
        self.stream_page_size = page_size.max(1);
        self
    }

    /// Sets the default set-based operation batch size.
    #[must_use]
    pub fn with_bulk_batch_size(mut self, batch_size: usize) -> Self {
        self.bulk_batch_size = batch_size.max(1);
        self
    }
}

/// Factory configuration to construct a store instance.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub options: StorageOptions,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::InMemoryPapaya,
            options: StorageOptions::default(),
        }
    }
}

/// Create a store instance based on the provided configuration.
pub fn create_document_store(config: &StorageConfig) -> DynDocumentStore {
    match config.backend {
        StorageBackend::InMemoryPapaya => {
            Arc::new(InMemoryDocumentStore::with_options(config.options.clone()))
        }
    }
}
