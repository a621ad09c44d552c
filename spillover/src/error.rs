//! Error types for the encode router.

use crate::job::JobState;
use spillover_cloud::StoreError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpilloverError {
    /// Missing or invalid region credentials, endpoints, or settings.
    /// Fatal; surfaced before any work begins.
    #[error("configuration error: {0}")]
    Config(String),

    /// The local input file does not exist or cannot be resolved.
    #[error("input error: {0}")]
    Input(String),

    /// A region call kept failing after retries.
    #[error("region unavailable: {0}")]
    RegionUnavailable(String),

    /// No processor in the catalog matches the configured encoder name.
    #[error("no processor named {0:?}")]
    ProcessorNotFound(String),

    /// A bundle copy completed with failed files; the request is aborted
    /// rather than risking a job or asset that references missing files.
    #[error("bundle copy completed with {failed} failed and {skipped} skipped files")]
    PartialCopyFailure { failed: u64, skipped: u64 },

    /// The backup-region job ended in a terminal state other than
    /// `Finished`; copy-back is aborted.
    #[error("job ended in state {state}")]
    JobTerminalNonSuccess { state: JobState },

    /// The job did not reach a terminal state within the configured bound.
    #[error("job did not reach a terminal state within {0:?}")]
    JobTimeout(Duration),

    /// Asset lookup failed.
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// Job lookup failed.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SpilloverError>;
