//! Regions, routing, and the per-region context handle.

use crate::service::JobService;
use serde::{Deserialize, Serialize};
use spillover_cloud::BlobStore;
use std::sync::Arc;

/// Which datacenter a piece of work runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionRole {
    /// Uploads land here; streaming is served from here.
    Primary,
    /// Overflow encode capacity.
    Backup,
}

impl std::fmt::Display for RegionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Backup => write!(f, "backup"),
        }
    }
}

/// Direction of a cross-region bundle copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyDirection {
    /// Input on its way out to the backup encoder.
    PrimaryToBackup,
    /// Encoded output on its way home.
    BackupToPrimary,
}

impl CopyDirection {
    /// Region the copy reads from.
    pub fn source(&self) -> RegionRole {
        match self {
            Self::PrimaryToBackup => RegionRole::Primary,
            Self::BackupToPrimary => RegionRole::Backup,
        }
    }

    /// Region the copy writes to.
    pub fn dest(&self) -> RegionRole {
        match self {
            Self::PrimaryToBackup => RegionRole::Backup,
            Self::BackupToPrimary => RegionRole::Primary,
        }
    }
}

/// The entire routing policy: overflow once the primary backlog reaches
/// the threshold.
pub fn route(pending: usize, threshold: usize) -> RegionRole {
    if pending >= threshold {
        RegionRole::Backup
    } else {
        RegionRole::Primary
    }
}

/// Handle bundling a region's job-submission service and storage account.
///
/// Two of these exist, built once at startup and read-only thereafter.
/// Concurrent request flows may share them freely; each flow operates on
/// its own asset and job identities.
#[derive(Clone)]
pub struct RegionContext {
    /// Role of this region.
    pub role: RegionRole,
    /// Job-submission service.
    pub jobs: Arc<dyn JobService>,
    /// Storage account.
    pub store: Arc<dyn BlobStore>,
}

impl RegionContext {
    /// Bundle a region's handles.
    pub fn new(role: RegionRole, jobs: Arc<dyn JobService>, store: Arc<dyn BlobStore>) -> Self {
        Self { role, jobs, store }
    }
}
