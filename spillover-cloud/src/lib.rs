//! Blob storage integration for the spillover encode router.
//!
//! This crate provides the storage seam the router copies asset bundles
//! through: a narrow [`BlobStore`] trait covering container/blob CRUD and
//! server-side copy, an Azure Blob Storage backend, and an in-process
//! memory backend for local runs and tests.
//!
//! # Features
//!
//! - `azure` - Azure Blob Storage support
//!
//! # Example
//!
//! ```ignore
//! use spillover_cloud::{BlobStore, MemoryStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let primary = Arc::new(MemoryStore::new("primarystore"));
//!     let backup = Arc::new(MemoryStore::new("backupstore"));
//!     backup.link(primary.clone());
//!
//!     // Recursive server-side copy of a whole container.
//!     let outcome = backup
//!         .copy_container_from(primary.as_ref(), "asset-in", "asset-out", &|p| {
//!             println!("{}", p);
//!         })
//!         .await?;
//!     assert_eq!(outcome.files_failed, 0);
//!     Ok(())
//! }
//! ```

use bytes::Bytes;

mod error;
mod memory;
#[cfg(feature = "azure")]
mod azure;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "azure")]
pub use azure::AzureBlobStore;

/// Attributes of a stored blob.
#[derive(Debug, Clone)]
pub struct BlobProperties {
    /// Blob name, relative to its container root. May contain `/` for
    /// nested directories.
    pub name: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Content type, if recorded.
    pub content_type: Option<String>,
}

/// Outcome of a single server-side blob copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyDisposition {
    /// The blob was copied; carries the byte count moved.
    Copied(u64),
    /// The destination already held an identical blob.
    Skipped,
}

/// Cumulative counters for a container copy, reported at every progress
/// callback and returned at completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyProgress {
    /// Files discovered under the source container root.
    pub total_files: u64,
    /// Files transferred so far.
    pub files_transferred: u64,
    /// Files skipped (already present) so far.
    pub files_skipped: u64,
    /// Files that failed to copy so far.
    pub files_failed: u64,
    /// Bytes moved so far.
    pub bytes_transferred: u64,
}

impl CopyProgress {
    /// Start a progress record for a copy of `total_files` files.
    pub fn with_total(total_files: u64) -> Self {
        Self {
            total_files,
            ..Default::default()
        }
    }

    /// Files handled so far, in any disposition.
    pub fn files_processed(&self) -> u64 {
        self.files_transferred + self.files_skipped + self.files_failed
    }
}

impl std::fmt::Display for CopyProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "transferred bytes: {}; transferred: {}; skipped: {}, failed: {}",
            self.bytes_transferred, self.files_transferred, self.files_skipped, self.files_failed
        )
    }
}

/// Blob storage trait.
///
/// One instance per storage account. Server-side copies address the source
/// by URL so the data path stays between the storage services; backends
/// with a native bulk-transfer API can override [`copy_container_from`]
/// wholesale.
///
/// [`copy_container_from`]: BlobStore::copy_container_from
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Storage account name.
    fn account(&self) -> &str;

    /// Absolute URL of a blob, usable as a server-side copy source.
    fn blob_url(&self, container: &str, name: &str) -> String;

    /// Create a container. Creating an existing container is not an error.
    async fn create_container(&self, container: &str) -> Result<()>;

    /// Upload a blob.
    async fn put_blob(&self, container: &str, name: &str, data: Bytes) -> Result<()>;

    /// Fetch a blob's content.
    async fn get_blob(&self, container: &str, name: &str) -> Result<Bytes>;

    /// Fetch a blob's attributes.
    async fn head_blob(&self, container: &str, name: &str) -> Result<BlobProperties>;

    /// List every blob under the container root, recursively, in name
    /// order.
    async fn list_blobs(&self, container: &str) -> Result<Vec<BlobProperties>>;

    /// Server-side copy of one blob from a source URL.
    async fn copy_blob_from_url(
        &self,
        source_url: &str,
        container: &str,
        name: &str,
    ) -> Result<CopyDisposition>;

    /// Delete a blob.
    async fn delete_blob(&self, container: &str, name: &str) -> Result<()>;

    /// Delete a container and everything in it.
    async fn delete_container(&self, container: &str) -> Result<()>;

    /// Recursive server-side copy of every blob under `source_container`
    /// into `dest_container`, preserving nested names.
    ///
    /// Individual blob failures are counted in the returned
    /// [`CopyProgress`] rather than aborting the copy; `on_progress`
    /// observes the cumulative counters after every blob.
    async fn copy_container_from(
        &self,
        source: &dyn BlobStore,
        source_container: &str,
        dest_container: &str,
        on_progress: &(dyn for<'p> Fn(&'p CopyProgress) + Send + Sync),
    ) -> Result<CopyProgress> {
        let blobs = source.list_blobs(source_container).await?;
        let mut progress = CopyProgress::with_total(blobs.len() as u64);

        for blob in &blobs {
            let url = source.blob_url(source_container, &blob.name);
            match self.copy_blob_from_url(&url, dest_container, &blob.name).await {
                Ok(CopyDisposition::Copied(bytes)) => {
                    progress.files_transferred += 1;
                    progress.bytes_transferred += bytes;
                }
                Ok(CopyDisposition::Skipped) => {
                    progress.files_skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        blob = %blob.name,
                        container = source_container,
                        error = %e,
                        "blob copy failed"
                    );
                    progress.files_failed += 1;
                }
            }
            on_progress(&progress);
        }

        Ok(progress)
    }
}
