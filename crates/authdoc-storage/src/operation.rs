//! Handles for set-based operations running inside the store.

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::StorageError;
use crate::StorageResult;

/// Options for `delete_by_query` and `patch_by_query`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOptions {
    /// Report the key of every affected document in the result.
    pub retrieve_details: bool,
    /// Documents processed per internal batch. Drivers pick a default when `None`.
    pub batch_size: Option<usize>,
}

impl BulkOptions {
    /// Requests per-document details.
    #[must_use]
    pub fn with_details(mut self) -> Self {
        self.retrieve_details = true;
        self
    }

    /// Sets the internal batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}

/// Summary of a completed set-based operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationResult {
    /// Identifier of the operation.
    pub operation_id: u64,
    /// Number of documents affected.
    pub total: u64,
    /// Keys of affected documents, when details were requested.
    pub details: Vec<String>,
}

/// A server-side operation that may still be running.
///
/// Dropping the handle before the operation reports completion kills it.
#[derive(Debug)]
pub struct Operation {
    id: u64,
    result: oneshot::Receiver<StorageResult<OperationResult>>,
    cancellation: CancellationToken,
    finished: bool,
}

impl Operation {
    /// Creates a handle fed by `result` and stopped through `cancellation`.
    #[must_use]
    pub fn new(
        id: u64,
        result: oneshot::Receiver<StorageResult<OperationResult>>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            id,
            result,
            cancellation,
            finished: false,
        }
    }

    /// Returns the operation identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Asks the store to stop the operation.
    pub fn kill(&self) {
        debug!(operation = self.id, "Killing operation");
        self.cancellation.cancel();
    }

    /// Waits until the operation completes.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::OperationFailed` if the operation stopped early,
    /// with the number of documents already processed.
    pub async fn wait_for_completion(mut self) -> StorageResult<OperationResult> {
        let outcome = (&mut self.result).await;
        self.finished = true;
        match outcome {
            Ok(result) => result,
            Err(_) => Err(StorageError::operation_failed(
                self.id,
                0,
                "operation ended without reporting a result",
            )),
        }
    }
}

impl Drop for Operation {
    fn drop(&mut self) {
        if !self.finished && !self.cancellation.is_cancelled() {
            debug!(operation = self.id, "Operation handle dropped before completion");
            self.cancellation.cancel();
        }
    }
}
