//! Live query handles.
//!
//! A [`Subscription`] is a stream of full, decoded result sets. It stops
//! yielding once its [`SubscriptionHandle`] is disposed, and disposing is
//! idempotent: the first call cancels the underlying listener, later calls
//! do nothing. Dropping a subscription disposes it.

use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use synergy_shared::{Document, Result};
use synergy_store::Query;

use crate::backend::SnapshotReceiver;
use crate::remote::{decode_all, RemoteAccess};

/// Cancels one live query.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    token: CancellationToken,
    disposed: Arc<AtomicBool>,
    label: Arc<str>,
}

impl SubscriptionHandle {
    fn new(token: CancellationToken, label: String) -> Self {
        Self {
            token,
            disposed: Arc::new(AtomicBool::new(false)),
            label: label.into(),
        }
    }

    /// Stop the live query. Returns `true` only for the call that actually
    /// released it.
    pub fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        debug!(subscription = %self.label, "Subscription disposed");
        true
    }

    /// Disposed directly, or through a cancelled parent token.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire) || self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Stream of result sets for one live query.
pub struct Subscription<T> {
    inner: UnboundedReceiverStream<Result<Vec<synergy_store::StoredDocument>>>,
    handle: SubscriptionHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(rx: SnapshotReceiver, token: CancellationToken, label: String) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(rx),
            handle: SubscriptionHandle::new(token, label),
            _marker: PhantomData,
        }
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.handle.clone()
    }

    pub fn dispose(&self) -> bool {
        self.handle.dispose()
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_disposed()
    }
}

impl<T: Document> Stream for Subscription<T> {
    type Item = Result<Vec<T>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.handle.is_disposed() {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(docs))) => Poll::Ready(Some(Ok(decode_all::<T>(docs)))),
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.handle.dispose();
    }
}

/// A re-subscribable query description. Each call to
/// [`subscribe`](Self::subscribe) starts an independent live query.
#[derive(Debug, Clone)]
pub struct LiveQuery<T> {
    query: Query,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Document> LiveQuery<T> {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            _marker: PhantomData,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn subscribe(&self, remote: &RemoteAccess) -> Result<Subscription<T>> {
        remote.subscribe(self.query.clone())
    }

    /// Subscribe under `parent`: cancelling the parent disposes this live
    /// query too.
    pub fn subscribe_child(
        &self,
        remote: &RemoteAccess,
        parent: &CancellationToken,
    ) -> Result<Subscription<T>> {
        remote.subscribe_child(self.query.clone(), parent)
    }
}
