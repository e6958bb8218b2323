//! `Pending`: the caller-facing handle for an issued load or sync.
//!
//! The requests behind a `Pending` are already running when it is returned;
//! awaiting it only observes the outcome. Dropping it does not cancel
//! anything: the work still completes and still updates the record set.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{LoadError, ProxyError, SyncError};
use crate::proxy::Batch;

/// Error value used when the task driving a `Pending` vanished without
/// reporting (runtime shutdown or a panicking listener).
pub trait Interrupted {
    fn interrupted() -> Self;
}

impl Interrupted for LoadError {
    fn interrupted() -> Self {
        LoadError {
            batch: Batch::default(),
            failed: 0,
            total: 0,
            source: ProxyError::new("load task ended before settling"),
        }
    }
}

impl Interrupted for SyncError {
    fn interrupted() -> Self {
        SyncError::Interrupted
    }
}

#[must_use = "the request is already issued; await the Pending to observe its outcome"]
pub struct Pending<T, E> {
    rx: oneshot::Receiver<Result<T, E>>,
}

impl<T, E> Pending<T, E> {
    pub(crate) fn channel() -> (oneshot::Sender<Result<T, E>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }
}

impl<T, E> std::fmt::Debug for Pending<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}

impl<T, E: Interrupted> Future for Pending<T, E> {
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(E::interrupted())),
            Poll::Pending => Poll::Pending,
        }
    }
}
