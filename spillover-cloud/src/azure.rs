//! Azure Blob Storage backend.
//!
//! Implements [`BlobStore`] on top of the `azure_storage_blobs` SDK.
//!
//! # Authentication
//!
//! Credentials come from, in order:
//! - a connection string ([`AzureBlobStore::from_connection_string`])
//! - an account name + access key ([`AzureBlobStore::from_key`])
//! - an account name + SAS token ([`AzureBlobStore::from_sas_token`])
//!
//! Server-side copies address source blobs by URL; cross-account copies
//! require the source to be reachable by the destination service (public
//! container or SAS-bearing URL).

use crate::{BlobProperties, BlobStore, CopyDisposition, Result, StoreError};
use bytes::Bytes;
use std::sync::Arc;

use azure_storage::prelude::*;
use azure_storage_blobs::prelude::*;

/// Azure Blob Storage account.
#[derive(Clone)]
pub struct AzureBlobStore {
    /// Account name
    account: String,
    /// Storage credentials
    credentials: Arc<StorageCredentials>,
}

impl AzureBlobStore {
    /// Create from a storage connection string.
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        // Parse connection string to extract account name
        let account = conn_str
            .split(';')
            .find_map(|part| {
                let (key, value) = part.split_once('=')?;
                if key.eq_ignore_ascii_case("AccountName") {
                    Some(value.to_string())
                } else {
                    None
                }
            })
            .ok_or_else(|| {
                StoreError::AuthenticationFailed("AccountName not found in connection string".into())
            })?;

        let credentials = StorageCredentials::connection_string(conn_str)
            .map_err(|e| StoreError::AuthenticationFailed(e.to_string()))?;

        Ok(Self {
            account,
            credentials: Arc::new(credentials),
        })
    }

    /// Create from a storage account key.
    pub fn from_key(account: &str, key: &str) -> Result<Self> {
        let credentials = StorageCredentials::access_key(account, key.to_string());
        Ok(Self {
            account: account.to_string(),
            credentials: Arc::new(credentials),
        })
    }

    /// Create from a SAS token.
    pub fn from_sas_token(account: &str, sas_token: &str) -> Result<Self> {
        let credentials = StorageCredentials::sas_token(sas_token)
            .map_err(|e| StoreError::AuthenticationFailed(e.to_string()))?;
        Ok(Self {
            account: account.to_string(),
            credentials: Arc::new(credentials),
        })
    }

    /// Get a blob client for the given container and blob
    fn get_blob_client(&self, container: &str, blob: &str) -> BlobClient {
        BlobServiceClient::new(&self.account, self.credentials.as_ref().clone())
            .container_client(container)
            .blob_client(blob)
    }

    /// Get a container client
    fn get_container_client(&self, container: &str) -> ContainerClient {
        BlobServiceClient::new(&self.account, self.credentials.as_ref().clone())
            .container_client(container)
    }
}

#[async_trait::async_trait]
impl BlobStore for AzureBlobStore {
    fn account(&self) -> &str {
        &self.account
    }

    fn blob_url(&self, container: &str, name: &str) -> String {
        format!(
            "https://{}.blob.core.windows.net/{}/{}",
            self.account, container, name
        )
    }

    async fn create_container(&self, container: &str) -> Result<()> {
        match self.get_container_client(container).create().await {
            Ok(()) => Ok(()),
            Err(e) => {
                let msg = e.to_string();
                // Already-existing containers are fine.
                if msg.contains("ContainerAlreadyExists") || msg.contains("409") {
                    Ok(())
                } else {
                    Err(StoreError::Other(msg))
                }
            }
        }
    }

    async fn put_blob(&self, container: &str, name: &str, data: Bytes) -> Result<()> {
        self.get_blob_client(container, name)
            .put_block_blob(data)
            .await
            .map_err(|e| StoreError::UploadFailed(e.to_string()))?;
        Ok(())
    }

    async fn get_blob(&self, container: &str, name: &str) -> Result<Bytes> {
        let response = self.get_blob_client(container, name).get().into_stream();
        let data = response
            .collect()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Ok(data.data)
    }

    async fn head_blob(&self, container: &str, name: &str) -> Result<BlobProperties> {
        let response = self
            .get_blob_client(container, name)
            .get_properties()
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("BlobNotFound") || msg.contains("404") {
                    StoreError::BlobNotFound(format!("{container}/{name}"))
                } else {
                    StoreError::Other(msg)
                }
            })?;

        let props = response.blob.properties;
        Ok(BlobProperties {
            name: name.to_string(),
            size_bytes: props.content_length,
            content_type: props.content_type.map(|ct| ct.to_string()),
        })
    }

    async fn list_blobs(&self, container: &str) -> Result<Vec<BlobProperties>> {
        let container_client = self.get_container_client(container);

        let mut results = Vec::new();
        let mut stream = container_client.list_blobs().into_stream();

        use futures::StreamExt;
        while let Some(response) = stream.next().await {
            let response = response.map_err(|e| StoreError::Other(e.to_string()))?;
            for blob in response.blobs.blobs() {
                results.push(BlobProperties {
                    name: blob.name.clone(),
                    size_bytes: blob.properties.content_length,
                    content_type: blob.properties.content_type.as_ref().map(|ct| ct.to_string()),
                });
            }
        }

        results.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(results)
    }

    async fn copy_blob_from_url(
        &self,
        source_url: &str,
        container: &str,
        name: &str,
    ) -> Result<CopyDisposition> {
        let url = url::Url::parse(source_url)
            .map_err(|e| StoreError::InvalidUrl(format!("{source_url}: {e}")))?;

        self.get_blob_client(container, name)
            .copy(url)
            .await
            .map_err(|e| StoreError::CopyFailed(e.to_string()))?;

        let props = self.head_blob(container, name).await?;
        Ok(CopyDisposition::Copied(props.size_bytes))
    }

    async fn delete_blob(&self, container: &str, name: &str) -> Result<()> {
        self.get_blob_client(container, name)
            .delete()
            .await
            .map_err(|e| StoreError::DeleteFailed(e.to_string()))?;
        Ok(())
    }

    async fn delete_container(&self, container: &str) -> Result<()> {
        self.get_container_client(container)
            .delete()
            .await
            .map_err(|e| StoreError::DeleteFailed(e.to_string()))?;
        Ok(())
    }
}
