//! Generic async key-value repository abstraction.
//!
//! Every entity repository in the gateway (credentials, paired devices,
//! sessions, cost entries, approval requests, trust signals, rollout
//! state, cache entries, batch queue items) is a typed wrapper over a
//! namespaced [`KvStore`]. The trait is storage-engine-agnostic; the only
//! implementation shipped here is an in-memory one backed by `dashmap`,
//! matching the persistence boundary the gateway draws around itself.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{StorageError, StorageResult};

/// An async key-value store keyed by opaque string keys within a
/// namespace, storing pre-serialized bytes.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the raw bytes stored under `key`, or `None` if absent.
    async fn get_raw(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store raw bytes under `key`, overwriting any existing value.
    async fn put_raw(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Remove the value stored under `key`. Not an error if absent.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()>;

    /// List every key currently stored in `namespace`.
    async fn keys(&self, namespace: &str) -> StorageResult<Vec<String>>;

    /// Fetch every value currently stored in `namespace`, in unspecified
    /// order.
    async fn values_raw(&self, namespace: &str) -> StorageResult<Vec<Vec<u8>>>;
}

/// In-memory [`KvStore`] backed by a `dashmap` per namespace. Data does
/// not survive process restart; the gateway treats persistence as an
/// internal implementation detail behind this trait.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    namespaces: DashMap<String, Arc<DashMap<String, Vec<u8>>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { namespaces: DashMap::new() }
    }

    fn namespace(&self, name: &str) -> Arc<DashMap<String, Vec<u8>>> {
        Arc::clone(&self.namespaces.entry(name.to_string()).or_default())
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get_raw(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.namespace(namespace).get(key).map(|v| v.clone()))
    }

    async fn put_raw(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.namespace(namespace).insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<()> {
        self.namespace(namespace).remove(key);
        Ok(())
    }

    async fn keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        Ok(self.namespace(namespace).iter().map(|e| e.key().clone()).collect())
    }

    async fn values_raw(&self, namespace: &str) -> StorageResult<Vec<Vec<u8>>> {
        Ok(self.namespace(namespace).iter().map(|e| e.value().clone()).collect())
    }
}

/// Typed convenience wrapper over a [`KvStore`] for a single namespace
/// and value type. Entity repositories (`CredentialRepository`,
/// `ApprovalRequestRepository`, etc.) are thin named wrappers around one
/// of these.
pub struct TypedRepository<T> {
    store: Arc<dyn KvStore>,
    namespace: String,
    _marker: std::marker::PhantomData<T>,
}

impl<T> TypedRepository<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Build a typed repository over `namespace` in `store`.
    pub fn new(store: Arc<dyn KvStore>, namespace: impl Into<String>) -> Self {
        Self { store, namespace: namespace.into(), _marker: std::marker::PhantomData }
    }

    /// Fetch and deserialize the value stored under `key`.
    pub async fn get(&self, key: &str) -> StorageResult<Option<T>> {
        match self.store.get_raw(&self.namespace, key).await? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                Ok(Some(value))
            },
            None => Ok(None),
        }
    }

    /// Fetch the value stored under `key`, returning
    /// [`StorageError::NotFound`] if absent.
    pub async fn require(&self, key: &str) -> StorageResult<T> {
        self.get(key).await?.ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    /// Serialize and store `value` under `key`.
    pub async fn put(&self, key: &str, value: &T) -> StorageResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.store.put_raw(&self.namespace, key, bytes).await
    }

    /// Remove the value stored under `key`.
    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        self.store.delete(&self.namespace, key).await
    }

    /// List every key present in this repository's namespace.
    pub async fn keys(&self) -> StorageResult<Vec<String>> {
        self.store.keys(&self.namespace).await
    }

    /// Fetch and deserialize every value in this repository's namespace.
    /// Entries that fail to deserialize are skipped rather than failing
    /// the whole scan, matching the audit-log tolerance for partial
    /// reads during recovery.
    pub async fn all(&self) -> StorageResult<Vec<T>> {
        let raw = self.store.values_raw(&self.namespace).await?;
        Ok(raw.iter().filter_map(|bytes| serde_json::from_slice(bytes).ok()).collect())
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Widget {
        id: String,
        count: u32,
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let repo: TypedRepository<Widget> = TypedRepository::new(store, "widgets");
        let widget = Widget { id: "a".into(), count: 3 };
        repo.put("a", &widget).await.unwrap();
        assert_eq!(repo.get("a").await.unwrap(), Some(widget));
    }

    #[tokio::test]
    async fn require_missing_key_is_not_found() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let repo: TypedRepository<Widget> = TypedRepository::new(store, "widgets");
        let err = repo.require("missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let repo: TypedRepository<Widget> = TypedRepository::new(store, "widgets");
        repo.put("a", &Widget { id: "a".into(), count: 1 }).await.unwrap();
        repo.delete("a").await.unwrap();
        assert_eq!(repo.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn namespaces_are_isolated() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let widgets: TypedRepository<Widget> = TypedRepository::new(store.clone(), "widgets");
        let gadgets: TypedRepository<Widget> = TypedRepository::new(store, "gadgets");
        widgets.put("a", &Widget { id: "a".into(), count: 1 }).await.unwrap();
        assert_eq!(gadgets.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn all_returns_every_value_in_namespace() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
        let repo: TypedRepository<Widget> = TypedRepository::new(store, "widgets");
        repo.put("a", &Widget { id: "a".into(), count: 1 }).await.unwrap();
        repo.put("b", &Widget { id: "b".into(), count: 2 }).await.unwrap();
        let mut all = repo.all().await.unwrap();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(all.len(), 2);
    }
}
