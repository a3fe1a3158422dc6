// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! String-granularity async locking.
//!
//! Serialises critical sections keyed by arbitrary strings (one lock per
//! plugin identifier) without holding a mutex per key forever: entries are
//! reference counted and collected when the last guard drops.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

struct Entry {
    mutex: Arc<AsyncMutex<()>>,
    refs: usize,
}

struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
}

/// A refcounted table of per-key async mutexes.
#[derive(Clone)]
pub struct GranularLock {
    inner: Arc<Inner>,
}

impl Default for GranularLock {
    fn default() -> Self {
        Self::new()
    }
}

impl GranularLock {
    pub fn new() -> Self {
        Self { inner: Arc::new(Inner { entries: Mutex::new(HashMap::new()) }) }
    }

    /// Acquire the lock for `key`, waiting if another task holds it.
    pub async fn lock(&self, key: &str) -> GranularGuard {
        let mutex = {
            let mut entries = self.inner.entries.lock();
            let entry = entries
                .entry(key.to_string())
                .or_insert_with(|| Entry { mutex: Arc::new(AsyncMutex::new(())), refs: 0 });
            entry.refs += 1;
            Arc::clone(&entry.mutex)
        };

        let guard = mutex.lock_owned().await;

        GranularGuard {
            inner: Arc::clone(&self.inner),
            key: key.to_string(),
            _guard: guard,
        }
    }

    /// Number of live key entries (for tests).
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Held lock for one key. Dropping releases the key and collects the
/// entry when no other waiter references it.
pub struct GranularGuard {
    inner: Arc<Inner>,
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for GranularGuard {
    fn drop(&mut self) {
        let mut entries = self.inner.entries.lock();
        if let Some(entry) = entries.get_mut(&self.key) {
            entry.refs -= 1;
            if entry.refs == 0 {
                entries.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
