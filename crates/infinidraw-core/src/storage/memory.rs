//! In-memory cache implementation.

use super::{LocalCache, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Inner {
    /// key -> (write sequence, value)
    entries: HashMap<String, (u64, String)>,
    next_seq: u64,
}

/// In-memory cache for testing and ephemeral use.
///
/// An optional byte quota makes writes fail with
/// [`StorageError::QuotaExceeded`] the way a browser cache would.
#[derive(Debug, Default)]
pub struct MemoryCache {
    inner: RwLock<Inner>,
    quota: Option<usize>,
}

impl MemoryCache {
    /// Create a new empty, unbounded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that holds at most `bytes` of values.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            inner: RwLock::default(),
            quota: Some(bytes),
        }
    }

    fn read_lock(&self) -> StorageResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| StorageError::Other(format!("Lock error: {e}")))
    }

    fn write_lock(&self) -> StorageResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {e}")))
    }

    /// Bytes currently held.
    pub fn used_bytes(&self) -> StorageResult<usize> {
        Ok(self.read_lock()?.entries.values().map(|(_, v)| v.len()).sum())
    }
}

impl LocalCache for MemoryCache {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.read_lock()?.entries.get(key).map(|(_, v)| v.clone()))
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut inner = self.write_lock()?;
        if let Some(quota) = self.quota {
            let others: usize = inner
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, (_, v))| v.len())
                .sum();
            if others + value.len() > quota {
                return Err(StorageError::QuotaExceeded(key.to_string()));
            }
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(key.to_string(), (seq, value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.write_lock()?.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.read_lock()?.entries.keys().cloned().collect())
    }

    fn evict_oldest(&self, count: usize) -> StorageResult<Vec<String>> {
        let mut inner = self.write_lock()?;
        let mut by_age: Vec<(u64, String)> = inner
            .entries
            .iter()
            .map(|(k, (seq, _))| (*seq, k.clone()))
            .collect();
        by_age.sort_unstable();
        let evicted: Vec<String> = by_age.into_iter().take(count).map(|(_, k)| k).collect();
        for key in &evicted {
            inner.entries.remove(key);
        }
        Ok(evicted)
    }
}
