//! Callback-to-future adapter
//!
//! Event-driven stores report outcomes by invoking callbacks (`onsuccess`,
//! `onerror`, `oncomplete`). [`event`] returns a pair: an [`EventSlot`] that
//! callbacks settle, and a [`Pending`] future that resolves with the first
//! outcome delivered. Later outcomes are ignored. If the slot is dropped
//! without being settled the future fails instead of hanging.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::FutureExt;

/// Description reported when an event source goes away without firing.
pub const DROPPED_EVENT: &str = "event source dropped before firing";

/// Create a connected slot/future pair.
pub fn event<T>() -> (EventSlot<T>, Pending<T>) {
    let (tx, rx) = oneshot::channel();
    (
        EventSlot {
            tx: RefCell::new(Some(tx)),
        },
        Pending { rx },
    )
}

/// Settled by the store's callbacks. First settlement wins.
pub struct EventSlot<T> {
    tx: RefCell<Option<oneshot::Sender<Result<T, String>>>>,
}

impl<T> EventSlot<T> {
    /// Fire the success event.
    pub fn succeed(&self, value: T) {
        self.settle(Ok(value));
    }

    /// Fire the error event with the store's description.
    pub fn fail(&self, description: impl Into<String>) {
        self.settle(Err(description.into()));
    }

    fn settle(&self, outcome: Result<T, String>) {
        if let Some(tx) = self.tx.borrow_mut().take() {
            // The awaiting side may have given up; nothing to report then.
            let _ = tx.send(outcome);
        }
    }
}

/// Future side of an event. Resolves with the store's description on failure.
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, String>>,
}

impl<T> Future for Pending<T> {
    type Output = Result<T, String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx.poll_unpin(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(DROPPED_EVENT.to_string())),
            Poll::Pending => Poll::Pending,
        }
    }
}
