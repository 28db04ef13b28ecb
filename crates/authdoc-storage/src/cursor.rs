//! Streaming cursor over query results.

use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::types::StoredDocument;
use crate::StorageResult;

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Forward-only cursor over the documents matched by a query.
///
/// The cursor holds driver resources until it is closed. It closes itself on
/// exhaustion and on drop, so early exits and cancellation release it too.
pub struct DocumentCursor {
    inner: Option<BoxStream<'static, StorageResult<StoredDocument>>>,
    release: Option<ReleaseHook>,
}

impl DocumentCursor {
    /// Wraps a document stream.
    #[must_use]
    pub fn new(inner: BoxStream<'static, StorageResult<StoredDocument>>) -> Self {
        Self {
            inner: Some(inner),
            release: None,
        }
    }

    /// Creates a cursor with no results.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(stream::empty().boxed())
    }

    /// Registers a hook run exactly once when the cursor closes.
    #[must_use]
    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    /// Releases the cursor. Further polls yield `None`.
    pub fn close(&mut self) {
        self.inner = None;
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Returns `true` once the cursor has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl Stream for DocumentCursor {
    type Item = StorageResult<StoredDocument>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match inner.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                self.close();
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for DocumentCursor {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for DocumentCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentCursor")
            .field("closed", &self.is_closed())
            .finish()
    }
}
