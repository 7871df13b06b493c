//! Per-view publish/subscribe channel
//!
//! A [`Publisher`] holds the latest value of one view. Subscribing delivers
//! that value immediately; afterwards each published change is delivered
//! exactly once. Publishing a value equal to the current one is a no-op.

use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

struct Inner<T> {
    current: T,
    subscribers: Vec<UnboundedSender<T>>,
}

/// Latest value of a view plus its live subscribers
pub struct Publisher<T> {
    inner: Mutex<Inner<T>>,
}

impl<T: Clone + PartialEq> Publisher<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Mutex::new(Inner {
                current: initial,
                subscribers: Vec::new(),
            }),
        }
    }

    // Publishing must never fail; a poisoned lock still guards valid data.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a subscriber, delivering the current value first
    pub fn subscribe(&self) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        // The receiver is alive, so this send cannot fail.
        let _ = sender.send(inner.current.clone());
        inner.subscribers.push(sender);
        Subscription { receiver }
    }

    /// Replace the current value and notify subscribers if it changed
    ///
    /// Returns whether a delivery happened.
    pub fn publish(&self, value: T) -> bool {
        let mut inner = self.lock();
        if inner.current == value {
            return false;
        }
        inner
            .subscribers
            .retain(|sender| sender.send(value.clone()).is_ok());
        inner.current = value;
        true
    }

    pub fn current(&self) -> T {
        self.lock().current.clone()
    }

    /// Number of subscribers that have not been dropped yet
    pub fn subscriber_count(&self) -> usize {
        let mut inner = self.lock();
        inner.subscribers.retain(|sender| !sender.is_closed());
        inner.subscribers.len()
    }
}

/// Receiving end of one view
///
/// Dropping the subscription unsubscribes; the publisher prunes the closed
/// channel on its next delivery.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    /// Wait for the next value
    ///
    /// Returns `None` once the publisher is gone and all values are consumed.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Take the next value if one is already waiting
    pub fn try_recv(&mut self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Blocking receive for callers outside an async runtime
    pub fn blocking_recv(&mut self) -> Option<T> {
        self.receiver.blocking_recv()
    }

    /// Drain every waiting value, oldest first
    pub fn drain(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Drain and keep only the newest waiting value
    pub fn latest(&mut self) -> Option<T> {
        self.drain().pop()
    }
}
