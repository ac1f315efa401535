//! Durable string key/value storage.
//!
//! The store is opaque: values are plain strings and callers own the JSON
//! encoding. Everything above this layer talks to `dyn KeyValueStore`.

use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-process store for tests.
///
/// Write counts are tracked per key so callers can assert how often a key was
/// written, and reads/writes can be switched to fail to exercise the
/// storage-unavailable paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    write_counts: Mutex<HashMap<String, usize>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::default();
        {
            let mut map = store.lock_entries();
            for (k, v) in entries {
                map.insert(k.into(), v.into());
            }
        }
        store
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `set` calls made against `key`.
    pub fn write_count(&self, key: &str) -> usize {
        self.write_counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Synchronous peek at the raw value, bypassing failure injection.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock_entries().get(key).cloned()
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map: every write is a single insert.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("memory store: read of '{key}' failed");
        }
        Ok(self.lock_entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("memory store: write of '{key}' failed");
        }
        self.lock_entries().insert(key.to_string(), value);
        *self
            .write_counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("memory store: remove of '{key}' failed");
        }
        self.lock_entries().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        store.set("k", "v".to_string()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.write_count("k"), 1);

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::with_entries([("k", "v")]);
        store.set_fail_reads(true);
        assert!(store.get("k").await.is_err());

        store.set_fail_writes(true);
        assert!(store.set("k", "w".to_string()).await.is_err());
        assert!(store.remove("k").await.is_err());
        assert_eq!(store.raw("k").as_deref(), Some("v"));
        assert_eq!(store.write_count("k"), 0);
    }
}
