//! In-process blob store.
//!
//! Backs local runs and the test suites. Containers are plain ordered
//! maps; cross-account server-side copies resolve `mem://` URLs through
//! peer stores registered with [`MemoryStore::link`], so two stores wired
//! together behave like two storage accounts that can reach each other.

use crate::{BlobProperties, BlobStore, CopyDisposition, Result, StoreError};
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

/// An in-memory storage account.
pub struct MemoryStore {
    account: String,
    containers: DashMap<String, BTreeMap<String, Bytes>>,
    peers: RwLock<Vec<Arc<MemoryStore>>>,
    poisoned: RwLock<HashSet<(String, String)>>,
    poisoned_names: RwLock<HashSet<String>>,
    deny_delete: RwLock<HashSet<String>>,
}

impl MemoryStore {
    /// Create an empty store for the given account name.
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            containers: DashMap::new(),
            peers: RwLock::new(Vec::new()),
            poisoned: RwLock::new(HashSet::new()),
            poisoned_names: RwLock::new(HashSet::new()),
            deny_delete: RwLock::new(HashSet::new()),
        }
    }

    /// Register another store as a reachable copy source.
    pub fn link(&self, peer: Arc<MemoryStore>) {
        self.peers.write().push(peer);
    }

    /// Make every future copy of the given blob fail.
    pub fn poison_blob(&self, container: impl Into<String>, name: impl Into<String>) {
        self.poisoned.write().insert((container.into(), name.into()));
    }

    /// Make every future copy of blobs with the given name fail, in any
    /// container.
    pub fn poison_name(&self, name: impl Into<String>) {
        self.poisoned_names.write().insert(name.into());
    }

    /// Make every future delete of the given container fail.
    pub fn deny_delete(&self, container: impl Into<String>) {
        self.deny_delete.write().insert(container.into());
    }

    /// Whether a container exists.
    pub fn has_container(&self, container: &str) -> bool {
        self.containers.contains_key(container)
    }

    fn read_blob(&self, container: &str, name: &str) -> Result<Bytes> {
        let entry = self
            .containers
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        entry
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::BlobNotFound(format!("{container}/{name}")))
    }

    /// Read a blob as a copy source, honoring poisoning.
    fn copy_source(&self, container: &str, name: &str) -> Result<Bytes> {
        if self
            .poisoned
            .read()
            .contains(&(container.to_string(), name.to_string()))
            || self.poisoned_names.read().contains(name)
        {
            return Err(StoreError::CopyFailed(format!(
                "simulated copy failure for {container}/{name}"
            )));
        }
        self.read_blob(container, name)
    }

    /// Resolve a `mem://account/container/name` URL against this store and
    /// its linked peers, returning the source bytes.
    fn resolve_url(&self, url: &str) -> Result<Bytes> {
        let rest = url
            .strip_prefix("mem://")
            .ok_or_else(|| StoreError::InvalidUrl(url.to_string()))?;
        let mut parts = rest.splitn(3, '/');
        let (account, container, name) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(c), Some(n)) if !a.is_empty() && !c.is_empty() && !n.is_empty() => {
                (a, c, n)
            }
            _ => return Err(StoreError::InvalidUrl(url.to_string())),
        };

        if account == self.account {
            return self.copy_source(container, name);
        }
        let peers = self.peers.read();
        let peer = peers
            .iter()
            .find(|p| p.account == account)
            .ok_or_else(|| StoreError::Network(format!("unreachable account: {account}")))?;
        peer.copy_source(container, name)
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryStore {
    fn account(&self) -> &str {
        &self.account
    }

    fn blob_url(&self, container: &str, name: &str) -> String {
        format!("mem://{}/{}/{}", self.account, container, name)
    }

    async fn create_container(&self, container: &str) -> Result<()> {
        self.containers
            .entry(container.to_string())
            .or_default();
        Ok(())
    }

    async fn put_blob(&self, container: &str, name: &str, data: Bytes) -> Result<()> {
        let mut entry = self
            .containers
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        entry.insert(name.to_string(), data);
        Ok(())
    }

    async fn get_blob(&self, container: &str, name: &str) -> Result<Bytes> {
        self.read_blob(container, name)
    }

    async fn head_blob(&self, container: &str, name: &str) -> Result<BlobProperties> {
        let data = self.read_blob(container, name)?;
        Ok(BlobProperties {
            name: name.to_string(),
            size_bytes: data.len() as u64,
            content_type: None,
        })
    }

    async fn list_blobs(&self, container: &str) -> Result<Vec<BlobProperties>> {
        let entry = self
            .containers
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        Ok(entry
            .iter()
            .map(|(name, data)| BlobProperties {
                name: name.clone(),
                size_bytes: data.len() as u64,
                content_type: None,
            })
            .collect())
    }

    async fn copy_blob_from_url(
        &self,
        source_url: &str,
        container: &str,
        name: &str,
    ) -> Result<CopyDisposition> {
        let data = self.resolve_url(source_url)?;

        let mut entry = self
            .containers
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        if entry.get(name).is_some_and(|existing| existing == &data) {
            return Ok(CopyDisposition::Skipped);
        }
        let bytes = data.len() as u64;
        entry.insert(name.to_string(), data);
        Ok(CopyDisposition::Copied(bytes))
    }

    async fn delete_blob(&self, container: &str, name: &str) -> Result<()> {
        let mut entry = self
            .containers
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        entry
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::BlobNotFound(format!("{container}/{name}")))
    }

    async fn delete_container(&self, container: &str) -> Result<()> {
        if self.deny_delete.read().contains(container) {
            return Err(StoreError::DeleteFailed(format!(
                "simulated delete failure for {container}"
            )));
        }
        self.containers
            .remove(container)
            .map(|_| ())
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(container: &str, blobs: &[(&str, &[u8])]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new("teststore"));
        store.containers.entry(container.to_string()).or_default();
        for (name, data) in blobs {
            store
                .containers
                .get_mut(container)
                .unwrap()
                .insert(name.to_string(), Bytes::copy_from_slice(data));
        }
        store
    }

    #[tokio::test]
    async fn test_put_and_list_sorted() {
        let store = MemoryStore::new("acct");
        store.create_container("c").await.unwrap();
        store.put_blob("c", "b.mp4", Bytes::from_static(b"bb")).await.unwrap();
        store.put_blob("c", "a/nested.mp4", Bytes::from_static(b"aa")).await.unwrap();

        let listed = store.list_blobs("c").await.unwrap();
        let names: Vec<_> = listed.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["a/nested.mp4", "b.mp4"]);
    }

    #[tokio::test]
    async fn test_put_requires_container() {
        let store = MemoryStore::new("acct");
        let err = store
            .put_blob("missing", "a", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ContainerNotFound(_)));
    }

    #[tokio::test]
    async fn test_cross_account_copy() {
        let source = store_with("in", &[("video.mp4", b"frames"), ("sub/cap.vtt", b"cues")]);
        let dest = Arc::new(MemoryStore::new("other"));
        dest.link(source.clone());
        dest.create_container("out").await.unwrap();

        let progress = dest
            .copy_container_from(source.as_ref(), "in", "out", &|_| {})
            .await
            .unwrap();

        assert_eq!(progress.files_transferred, 2);
        assert_eq!(progress.files_failed, 0);
        assert_eq!(progress.bytes_transferred, 10);
        assert_eq!(dest.get_blob("out", "sub/cap.vtt").await.unwrap(), Bytes::from_static(b"cues"));
    }

    #[tokio::test]
    async fn test_copy_skips_identical() {
        let source = store_with("in", &[("video.mp4", b"frames")]);
        let dest = Arc::new(MemoryStore::new("other"));
        dest.link(source.clone());
        dest.create_container("out").await.unwrap();

        let first = dest
            .copy_container_from(source.as_ref(), "in", "out", &|_| {})
            .await
            .unwrap();
        assert_eq!(first.files_transferred, 1);

        let second = dest
            .copy_container_from(source.as_ref(), "in", "out", &|_| {})
            .await
            .unwrap();
        assert_eq!(second.files_transferred, 0);
        assert_eq!(second.files_skipped, 1);
    }

    #[tokio::test]
    async fn test_poisoned_blob_counts_as_failed() {
        let source = store_with("in", &[("good.mp4", b"ok"), ("bad.mp4", b"no")]);
        source.poison_blob("in", "bad.mp4");
        let dest = Arc::new(MemoryStore::new("other"));
        dest.link(source.clone());
        dest.create_container("out").await.unwrap();

        let progress = dest
            .copy_container_from(source.as_ref(), "in", "out", &|_| {})
            .await
            .unwrap();
        assert_eq!(progress.files_transferred, 1);
        assert_eq!(progress.files_failed, 1);
        assert!(dest.get_blob("out", "bad.mp4").await.is_err());
    }

    #[tokio::test]
    async fn test_denied_container_delete() {
        let store = store_with("keep", &[("a", b"x")]);
        store.deny_delete("keep");
        assert!(matches!(
            store.delete_container("keep").await.unwrap_err(),
            StoreError::DeleteFailed(_)
        ));
        assert!(store.has_container("keep"));
    }

    #[tokio::test]
    async fn test_unreachable_account() {
        let dest = MemoryStore::new("lonely");
        dest.create_container("out").await.unwrap();
        let err = dest
            .copy_blob_from_url("mem://nowhere/c/b", "out", "b")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Network(_)));
    }
}
