// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::*;

#[tokio::test]
async fn same_key_is_mutually_exclusive() {
    let lock = GranularLock::new();
    let in_section = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let lock = lock.clone();
        let in_section = Arc::clone(&in_section);
        let max_seen = Arc::clone(&max_seen);
        handles.push(tokio::spawn(async move {
            let _guard = lock.lock("acme/demo:1.0@abc").await;
            let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            in_section.fetch_sub(1, Ordering::SeqCst);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn different_keys_do_not_block_each_other() {
    let lock = GranularLock::new();
    let _a = lock.lock("a").await;
    // must not deadlock
    let _b = lock.lock("b").await;
    assert_eq!(lock.len(), 2);
}

#[tokio::test]
async fn entries_are_collected_when_unused() {
    let lock = GranularLock::new();
    {
        let _guard = lock.lock("transient").await;
        assert_eq!(lock.len(), 1);
    }
    assert!(lock.is_empty());
}

#[tokio::test]
async fn waiters_keep_the_entry_alive() {
    let lock = GranularLock::new();
    let guard = lock.lock("k").await;

    let lock2 = lock.clone();
    let waiter = tokio::spawn(async move {
        let _g = lock2.lock("k").await;
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(lock.len(), 1);
    drop(guard);
    waiter.await.unwrap();
    assert!(lock.is_empty());
}
