//! Shared configuration store contract.
//!
//! Instances coordinate only through string records in a store shared by the
//! whole cluster. Writes are last-writer-wins; nothing here is transactional.
mod memory;
#[cfg(test)]
mod faulty;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::error::StoreError;

pub use memory::MemoryStore;
#[cfg(test)]
pub(crate) use faulty::FaultyStore;

#[async_trait]
pub trait ConfigStore: Send + Sync + 'static {
    /// Value stored under `key`, `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn put(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Remove `key`; removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Every `(key, value)` whose key starts with `prefix`, ordered by key.
    async fn scan(&self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;
}

pub type StoreHandle = Arc<dyn ConfigStore>;

/// Read and decode a JSON record.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn ConfigStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(raw) => decode(key, &raw).map(Some),
        None => Ok(None),
    }
}

/// Encode and write a JSON record.
pub async fn put_json<T: Serialize + Sync>(
    store: &dyn ConfigStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(|e| StoreError::Serde {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    store.put(key, raw).await
}

pub(crate) fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Serde {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
