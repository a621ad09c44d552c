//! Overflow routing of encode jobs between two datacenters.
//!
//! Every encode request uploads into the primary region. If the primary
//! backlog has reached a configured threshold, the request overflows: the
//! input bundle is copied server-side to the backup region, encoded
//! there, and the encoded bundle is copied home and registered as a fresh
//! primary-region asset, after which the transient backup artifacts are
//! torn down.
//!
//! # Architecture
//!
//! - **Queue inspection** reads the primary backlog, with bounded retry.
//! - **Routing** is one pure threshold comparison.
//! - **Replication** copies a whole asset bundle between the regions'
//!   storage accounts and re-registers it in the destination catalog.
//! - **Orchestration** submits a one-task job and consumes its state
//!   transitions until terminal, bounded by a timeout.
//! - **Cleanup** tears the backup artifacts down, best-effort.
//!
//! The job-submission and storage services sit behind the [`JobService`]
//! and [`spillover_cloud::BlobStore`] traits; region handles are built
//! once from [`Config`] and passed by reference.
//!
//! # Example
//!
//! ```ignore
//! use spillover::{Config, Pipeline, RegionContext, RegionRole, SimJobService};
//! use spillover::orchestrator::NullObserver;
//! use spillover_cloud::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let primary_store = Arc::new(MemoryStore::new("primarystore"));
//!     let backup_store = Arc::new(MemoryStore::new("backupstore"));
//!     primary_store.link(backup_store.clone());
//!     backup_store.link(primary_store.clone());
//!
//!     let primary = RegionContext::new(
//!         RegionRole::Primary,
//!         Arc::new(SimJobService::new(RegionRole::Primary, primary_store.clone())),
//!         primary_store,
//!     );
//!     let backup = RegionContext::new(
//!         RegionRole::Backup,
//!         Arc::new(SimJobService::new(RegionRole::Backup, backup_store.clone())),
//!         backup_store,
//!     );
//!
//!     let pipeline = Pipeline::new(Config::default(), primary, backup);
//!     let report = pipeline
//!         .run("video.mp4".as_ref(), &NullObserver, &|_| {})
//!         .await?;
//!     println!("encoded via {}", report.route);
//!     Ok(())
//! }
//! ```

pub mod asset;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod pipeline;
pub mod queue;
pub mod region;
pub mod replicate;
pub mod service;
pub mod sim;

pub use asset::{Asset, AssetCreationOptions, AssetFile, PrimaryFallback, MANIFEST_EXT};
pub use config::{Config, RegionSettings, DEFAULT_QUEUE_THRESHOLD};
pub use error::{Result, SpilloverError};
pub use job::{Job, JobState, JobTransition, Task};
pub use orchestrator::{EncodeOrchestrator, NullObserver, TransitionObserver};
pub use pipeline::{EncodeReport, Pipeline};
pub use region::{route, CopyDirection, RegionContext, RegionRole};
pub use replicate::{AssetReplicator, TransferOutcome};
pub use service::{JobEvent, JobService, JobSpec, Processor};
pub use sim::SimJobService;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
