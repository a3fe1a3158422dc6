// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded pool for short-lived background work.
//!
//! Long-lived loops (schedule loops, pumps, monitors) own their tasks;
//! everything transient — notifier fan-out, install progress streaming,
//! shutdown waits — goes through the pool so a runaway component cannot
//! spawn without bound. Submitting suspends when the pool is full; that is
//! the only backpressure.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

#[derive(Clone)]
pub struct TaskPool {
    permits: Arc<Semaphore>,
}

impl TaskPool {
    pub fn new(capacity: usize) -> Self {
        Self { permits: Arc::new(Semaphore::new(capacity)) }
    }

    /// Spawn `future` once a pool slot is available. The slot is held for
    /// the lifetime of the task. `module`/`method` label the task in logs.
    pub async fn submit<F>(&self, module: &'static str, method: &'static str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // The semaphore is never closed, so acquisition only fails if the
        // pool itself was dropped mid-acquire.
        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::warn!(module, method, "task pool closed, running task without slot");
                return tokio::spawn(future);
            }
        };

        tokio::spawn(async move {
            let _permit = permit;
            future.await;
        })
    }

    /// Remaining capacity (for tests and health reporting).
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn runs_submitted_work() {
        let pool = TaskPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let handle = pool
            .submit("tests", "runs_submitted_work", async move {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        handle.await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slot_is_released_when_task_finishes() {
        let pool = TaskPool::new(1);
        let handle = pool.submit("tests", "slot_release", async {}).await;
        handle.await.unwrap();
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn full_pool_suspends_submitters() {
        let pool = TaskPool::new(1);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let _busy = pool
            .submit("tests", "holder", async move {
                let _ = rx.await;
            })
            .await;
        assert_eq!(pool.available(), 0);

        let pool2 = pool.clone();
        let second = tokio::spawn(async move {
            pool2.submit("tests", "waiter", async {}).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!second.is_finished());

        tx.send(()).ok();
        second.await.unwrap();
    }
}
