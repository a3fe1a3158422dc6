// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session subscription channel.
//!
//! One host request gets one `Subscription`; the owning runtime keeps the
//! matching `Broadcast` sender in the instance's listener table. The
//! channel is bounded, so a slow consumer backpressures the pump. Dropping
//! the subscription runs the close hooks the runtime registered (detach
//! listener, clear the session binding).

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Default queue depth per session.
pub const SESSION_QUEUE_DEPTH: usize = 512;

type CloseHook = Box<dyn FnOnce() + Send>;

/// Create a connected sender/subscription pair.
pub fn channel<T>(capacity: usize) -> (Broadcast<T>, Subscription<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    let hooks = Arc::new(Mutex::new(Vec::new()));
    (Broadcast { tx }, Subscription { rx, hooks })
}

/// Producer half, held by the runtime.
#[derive(Clone)]
pub struct Broadcast<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Broadcast<T> {
    /// Deliver one item, waiting if the subscriber is behind. Returns
    /// `false` when the subscription is gone.
    pub async fn send(&self, item: T) -> bool {
        self.tx.send(item).await.is_ok()
    }

    /// Non-blocking delivery for synchronous callers (close hooks).
    /// Returns `false` when the queue is full or the subscription is gone.
    pub fn try_send(&self, item: T) -> bool {
        self.tx.try_send(item).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, returned to the caller of `listen`.
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
    hooks: Arc<Mutex<Vec<CloseHook>>>,
}

impl<T> Subscription<T> {
    /// Register a hook to run when this subscription closes.
    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        self.hooks.lock().push(Box::new(hook));
    }

    /// Receive the next item; `None` once the producer side is gone and
    /// the queue is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.rx.close();
        let hooks: Vec<CloseHook> = std::mem::take(&mut *self.hooks.lock());
        for hook in hooks {
            hook();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn delivers_in_order() {
        let (tx, mut sub) = channel(8);
        assert!(tx.send(1).await);
        assert!(tx.send(2).await);
        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, Some(2));
    }

    #[tokio::test]
    async fn close_hooks_fire_on_drop() {
        let fired = Arc::new(AtomicBool::new(false));
        let (tx, sub) = channel::<u8>(1);
        let f = Arc::clone(&fired);
        sub.on_close(move || f.store(true, Ordering::SeqCst));
        drop(sub);
        assert!(fired.load(Ordering::SeqCst));
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn send_to_dropped_subscription_reports_closed() {
        let (tx, sub) = channel::<u8>(1);
        drop(sub);
        assert!(!tx.send(7).await);
    }
}
