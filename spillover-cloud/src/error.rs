//! Blob storage errors

use thiserror::Error;

/// Errors from blob storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Container not found
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// Blob not found
    #[error("blob not found: {0}")]
    BlobNotFound(String),

    /// Invalid blob URL
    #[error("invalid blob URL: {0}")]
    InvalidUrl(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Server-side copy failed
    #[error("copy failed: {0}")]
    CopyFailed(String),

    /// Upload failed
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// Delete failed
    #[error("delete failed: {0}")]
    DeleteFailed(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
