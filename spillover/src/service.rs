//! The job-submission seam.
//!
//! [`JobService`] is the narrow interface the router drives a region's
//! encode service through: asset catalog, processor catalog, job
//! submission, and a broadcast subscription of job state transitions.

use crate::asset::{Asset, AssetCreationOptions, AssetFile};
use crate::error::Result;
use crate::job::{Job, JobTransition};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An available processor, by name and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Processor {
    /// Processor name.
    pub name: String,
    /// Dotted version string, e.g. `"4.7"`.
    pub version: String,
}

impl Processor {
    /// Create a processor entry.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Everything needed to submit a job: one task, one input, one output.
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Job display name.
    pub name: String,
    /// Input asset id.
    pub input_asset_id: String,
    /// Name for the freshly created output asset.
    pub output_asset_name: String,
    /// Creation options for the output asset.
    pub output_asset_options: AssetCreationOptions,
    /// Processor to run.
    pub processor_name: String,
    /// Encode profile handed to the processor.
    pub profile: String,
}

/// A job state change, broadcast to subscribers in transition order.
#[derive(Debug, Clone)]
pub struct JobEvent {
    /// The job that changed.
    pub job_id: String,
    /// The transition.
    pub transition: JobTransition,
}

/// A region's job-submission service.
#[async_trait::async_trait]
pub trait JobService: Send + Sync {
    /// Number of jobs currently waiting in this region's queue.
    async fn pending_count(&self) -> Result<usize>;

    /// The region's processor catalog.
    async fn processors(&self) -> Result<Vec<Processor>>;

    /// Create an empty asset and its backing container.
    async fn create_asset(&self, name: &str, options: AssetCreationOptions) -> Result<Asset>;

    /// Register a file entry on an asset.
    async fn register_file(&self, asset_id: &str, file: AssetFile) -> Result<()>;

    /// Fetch an asset with its current file list.
    async fn asset(&self, asset_id: &str) -> Result<Asset>;

    /// Submit a job. The returned job is in its initial `Queued` state;
    /// transitions arrive on the [`subscribe`](JobService::subscribe)
    /// channel.
    async fn submit_job(&self, spec: JobSpec) -> Result<Job>;

    /// Subscribe to job state transitions. Events for every job in the
    /// region arrive on one channel, in transition order, tagged with the
    /// job id. Subscribe before submitting to observe a job from `Queued`.
    fn subscribe(&self) -> broadcast::Receiver<JobEvent>;

    /// Fetch a job's current state.
    async fn job(&self, job_id: &str) -> Result<Job>;

    /// Delete an asset and its backing container.
    async fn delete_asset(&self, asset_id: &str) -> Result<()>;

    /// Delete a job.
    async fn delete_job(&self, job_id: &str) -> Result<()>;
}

/// Among processors matching `name`, the one with the numerically greatest
/// version.
pub fn latest_processor_by_name(processors: &[Processor], name: &str) -> Option<Processor> {
    processors
        .iter()
        .filter(|p| p.name == name)
        .max_by(|a, b| version_key(&a.version).cmp(&version_key(&b.version)))
        .cloned()
}

/// Dotted version string as a numeric sort key. Non-numeric segments sort
/// as zero.
fn version_key(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| part.trim().parse().unwrap_or(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_is_numeric_not_lexicographic() {
        let procs = vec![
            Processor::new("Media Encoder Standard", "2.9"),
            Processor::new("Media Encoder Standard", "2.10"),
            Processor::new("Thumbnail Generator", "9.0"),
        ];
        let latest = latest_processor_by_name(&procs, "Media Encoder Standard").unwrap();
        assert_eq!(latest.version, "2.10");
    }

    #[test]
    fn test_no_match() {
        let procs = vec![Processor::new("Thumbnail Generator", "1.0")];
        assert!(latest_processor_by_name(&procs, "Media Encoder Standard").is_none());
    }

    #[test]
    fn test_version_key_ordering() {
        assert!(version_key("4.7") > version_key("4.6.1"));
        assert!(version_key("10.0") > version_key("9.9"));
        assert_eq!(version_key("1.x"), vec![1, 0]);
    }
}
