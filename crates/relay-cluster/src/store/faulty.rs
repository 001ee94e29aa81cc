use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{ConfigStore, MemoryStore};
use crate::error::StoreError;

/// [`MemoryStore`] whose writes or scans can be switched to fail.
#[derive(Debug, Default)]
pub(crate) struct FaultyStore {
    inner: MemoryStore,
    fail_put: AtomicBool,
    fail_scan: AtomicBool,
}

impl FaultyStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_puts(&self, on: bool) {
        self.fail_put.store(on, Ordering::SeqCst);
    }

    pub(crate) fn fail_scans(&self, on: bool) {
        self.fail_scan.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigStore for FaultyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!("write of {key} refused")));
        }
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        if self.fail_scan.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(format!("scan of {prefix} refused")));
        }
        self.inner.scan(prefix).await
    }
}
