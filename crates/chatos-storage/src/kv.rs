//! Raw key/value tier, backed by `SurrealKV` — an embedded, versioned,
//! ACID-compliant LSM-tree store. Used for the config store's JSON-blob
//! settings map (§4.1) and the tagged-variant configuration values (§9).

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};

/// A single stored entry: the raw bytes plus the time it was last written.
#[derive(Debug, Clone)]
pub struct KvEntry {
    /// Raw value bytes.
    pub value: Vec<u8>,
    /// Unix timestamp (milliseconds) of the write that produced this value.
    pub updated_at_ms: i64,
}

/// Byte-oriented key/value store.
///
/// Implementations must be safe to share across concurrent tasks; all
/// methods take `&self`.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch the raw value for `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] on backend failure (not on a missing key,
    /// which yields `Ok(None)`).
    async fn get(&self, key: &str) -> StorageResult<Option<KvEntry>>;

    /// Write `value` for `key`, overwriting any prior value.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] on backend failure.
    async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Remove `key`. A missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] on backend failure.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// List all keys with the given prefix.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] on backend failure.
    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// In-memory [`KvStore`], used by tests and as the default when no embedded
/// database path is configured.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<String, KvEntry>>,
}

impl MemoryKvStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<KvEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let entry = KvEntry {
            value,
            updated_at_ms: chrono::Utc::now().timestamp_millis(),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .entries
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// `SurrealKV`-backed [`KvStore`], persisted at a file path.
pub struct SurrealKvStore {
    inner: Arc<RwLock<surrealkv::Store>>,
}

impl std::fmt::Debug for SurrealKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealKvStore").finish_non_exhaustive()
    }
}

impl SurrealKvStore {
    /// Open (creating if absent) a `SurrealKV` store at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the store cannot be opened.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let mut opts = surrealkv::Options::new();
        opts.dir = path.to_path_buf();
        let store = surrealkv::Store::new(opts)
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(RwLock::new(store)),
        })
    }
}

#[async_trait]
impl KvStore for SurrealKvStore {
    async fn get(&self, key: &str) -> StorageResult<Option<KvEntry>> {
        let store = self.inner.read().await;
        let mut txn = store
            .begin()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        match txn
            .get(key.as_bytes())
            .map_err(|e| StorageError::Internal(e.to_string()))?
        {
            Some(value) => Ok(Some(KvEntry {
                value,
                updated_at_ms: chrono::Utc::now().timestamp_millis(),
            })),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let store = self.inner.write().await;
        let mut txn = store
            .begin()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        txn.set(key.as_bytes(), &value)
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        txn.commit()
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let store = self.inner.write().await;
        let mut txn = store
            .begin()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        txn.delete(key.as_bytes())
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        txn.commit()
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let store = self.inner.read().await;
        let txn = store
            .begin()
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        let range = prefix.as_bytes().to_vec()..;
        let mut keys = Vec::new();
        for entry in txn
            .scan(range, None)
            .map_err(|e| StorageError::Internal(e.to_string()))?
        {
            let (key_bytes, _, _) = entry;
            let key = String::from_utf8_lossy(&key_bytes).into_owned();
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key);
        }
        Ok(keys)
    }
}

/// A [`KvStore`] wrapper that transparently prefixes every key with a fixed
/// namespace, so unrelated subsystems sharing one physical store never
/// collide on key names.
#[derive(Clone)]
pub struct ScopedKvStore<S> {
    inner: Arc<S>,
    namespace: String,
}

impl<S: KvStore> ScopedKvStore<S> {
    /// Wrap `inner`, scoping every key under `namespace:`.
    #[must_use]
    pub fn new(inner: Arc<S>, namespace: impl Into<String>) -> Self {
        Self {
            inner,
            namespace: namespace.into(),
        }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

#[async_trait]
impl<S: KvStore> KvStore for ScopedKvStore<S> {
    async fn get(&self, key: &str) -> StorageResult<Option<KvEntry>> {
        self.inner.get(&self.scoped(key)).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.inner.set(&self.scoped(key), value).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(&self.scoped(key)).await
    }

    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let full_prefix = self.scoped(prefix);
        let keys = self.inner.list_keys(&full_prefix).await?;
        let strip = format!("{}:", self.namespace);
        Ok(keys
            .into_iter()
            .map(|k| k.strip_prefix(&strip).map(str::to_string).unwrap_or(k))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryKvStore::new();
        assert!(store.get("a").await.unwrap().is_none());
        store.set("a", b"hello".to_vec()).await.unwrap();
        let entry = store.get("a").await.unwrap().unwrap();
        assert_eq!(entry.value, b"hello");
    }

    #[tokio::test]
    async fn memory_store_delete() {
        let store = MemoryKvStore::new();
        store.set("a", b"1".to_vec()).await.unwrap();
        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_list_keys_by_prefix() {
        let store = MemoryKvStore::new();
        store.set("model:a", b"1".to_vec()).await.unwrap();
        store.set("model:b", b"2".to_vec()).await.unwrap();
        store.set("mcp:c", b"3".to_vec()).await.unwrap();
        let mut keys = store.list_keys("model:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["model:a", "model:b"]);
    }

    #[tokio::test]
    async fn scoped_store_isolates_namespaces() {
        let inner = Arc::new(MemoryKvStore::new());
        let a = ScopedKvStore::new(inner.clone(), "ns-a");
        let b = ScopedKvStore::new(inner.clone(), "ns-b");
        a.set("key", b"from-a".to_vec()).await.unwrap();
        assert!(b.get("key").await.unwrap().is_none());
        assert_eq!(a.get("key").await.unwrap().unwrap().value, b"from-a");
    }

    #[tokio::test]
    async fn scoped_store_list_keys_strips_namespace() {
        let inner = Arc::new(MemoryKvStore::new());
        let scoped = ScopedKvStore::new(inner, "ns");
        scoped.set("alpha", b"1".to_vec()).await.unwrap();
        scoped.set("beta", b"2".to_vec()).await.unwrap();
        let mut keys = scoped.list_keys("").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["alpha", "beta"]);
    }
}
