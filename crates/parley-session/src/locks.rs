use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-key async mutex.
///
/// Operations on the same key serialize; different keys proceed concurrently.
/// Used by stores to make check-and-create sequences atomic per session id.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl KeyedLocks {
    /// Create an empty lock map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `key`, waiting for any current holder.
    ///
    /// The entry for `key` is removed when the last guard or waiter lets go,
    /// so the map only holds keys that are in use.
    pub async fn lock(&self, key: &str) -> KeyedGuard {
        let guard = self.get(key).lock_owned().await;
        KeyedGuard {
            key: key.to_string(),
            guard: Some(guard),
            locks: self.clone(),
        }
    }

    fn get(&self, key: &str) -> Arc<AsyncMutex<()>> {
        self.locks
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// True when no key is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &str) {
        let mut locks = self.locks.lock();
        if locks
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(key);
        }
    }
}

/// Held lock on one key of a [`KeyedLocks`].
pub struct KeyedGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: KeyedLocks,
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        // Unlock before checking, so our own Arc is no longer counted.
        self.guard.take();
        self.locks.release(&self.key);
    }
}
