use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use thiserror::Error;

use crate::StorageBackend;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemoryStorageError {
    #[error("quota of {quota} bytes exceeded")]
    QuotaExceeded { quota: usize },
    #[error("storage is read-only")]
    ReadOnly,
}

#[derive(Debug, Default)]
struct Inner {
    items: BTreeMap<String, String>,
    quota: Option<usize>,
    read_only: bool,
    writes: usize,
}

/// In-process stand-in for browser `localStorage`. Clones share the same
/// underlying map, so a test can keep a handle while the tracker owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed storage with raw key/value pairs, e.g. from a browser dump.
    #[must_use]
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let storage = Self::new();
        storage.inner.borrow_mut().items = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        storage
    }

    /// Reject writes that would push total stored bytes over `quota`.
    pub fn set_quota(&self, quota: Option<usize>) {
        self.inner.borrow_mut().quota = quota;
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.inner.borrow_mut().read_only = read_only;
    }

    /// Number of successful `set_item` calls so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.borrow().writes
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner.borrow().items.clone()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.borrow().items.contains_key(key)
    }

    fn used_bytes_with(inner: &Inner, key: &str, value: &str) -> usize {
        inner
            .items
            .iter()
            .filter(|(existing, _)| existing.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum::<usize>()
            + key.len()
            + value.len()
    }
}

impl StorageBackend for MemoryStorage {
    type Error = MemoryStorageError;

    fn get_item(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.inner.borrow().items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        let mut inner = self.inner.borrow_mut();
        if inner.read_only {
            return Err(MemoryStorageError::ReadOnly);
        }
        if let Some(quota) = inner.quota {
            if Self::used_bytes_with(&inner, key, value) > quota {
                return Err(MemoryStorageError::QuotaExceeded { quota });
            }
        }
        inner.items.insert(key.to_string(), value.to_string());
        inner.writes += 1;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), Self::Error> {
        self.inner.borrow_mut().items.remove(key);
        Ok(())
    }

    fn is_quota_exceeded(error: &Self::Error) -> bool {
        matches!(error, MemoryStorageError::QuotaExceeded { .. })
    }
}
