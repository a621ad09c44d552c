//! In-process job service.
//!
//! Drives the full job state machine on a spawned task, broadcasting each
//! transition, and writes encode renditions (including a streaming
//! manifest) into the output asset's container so round trips are
//! observable end to end. Fault-injection knobs cover the failure paths
//! the router has to handle: queue outages, failing jobs, stalled jobs,
//! and denied deletes.

use crate::asset::{Asset, AssetCreationOptions, AssetFile};
use crate::error::{Result, SpilloverError};
use crate::job::{Job, JobState, JobTransition, Task};
use crate::region::RegionRole;
use crate::service::{JobEvent, JobService, JobSpec, Processor};
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use spillover_cloud::BlobStore;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Simulated per-region job service.
#[derive(Clone)]
pub struct SimJobService {
    region: RegionRole,
    store: Arc<dyn BlobStore>,
    assets: Arc<DashMap<String, Asset>>,
    jobs: Arc<DashMap<String, Job>>,
    processors: Arc<RwLock<Vec<Processor>>>,
    pending: Arc<AtomicUsize>,
    pending_failures: Arc<AtomicU32>,
    fail_jobs: Arc<AtomicBool>,
    stall_jobs: Arc<AtomicBool>,
    deny_delete: Arc<RwLock<HashSet<String>>>,
    event_tx: broadcast::Sender<JobEvent>,
    step_delay: Duration,
}

impl SimJobService {
    /// Create a service for one region, backed by the given store.
    pub fn new(region: RegionRole, store: Arc<dyn BlobStore>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            region,
            store,
            assets: Arc::new(DashMap::new()),
            jobs: Arc::new(DashMap::new()),
            processors: Arc::new(RwLock::new(vec![
                Processor::new("Media Encoder Standard", "3.7"),
                Processor::new("Media Encoder Standard", "4.7"),
                Processor::new("Media Encoder Premium Workflow", "4.4"),
            ])),
            pending: Arc::new(AtomicUsize::new(0)),
            pending_failures: Arc::new(AtomicU32::new(0)),
            fail_jobs: Arc::new(AtomicBool::new(false)),
            stall_jobs: Arc::new(AtomicBool::new(false)),
            deny_delete: Arc::new(RwLock::new(HashSet::new())),
            event_tx,
            step_delay: Duration::from_millis(2),
        }
    }

    /// Set the reported queue depth.
    pub fn set_pending(&self, count: usize) {
        self.pending.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` queue inspections fail.
    pub fn fail_next_pending(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Drive every submitted job to `Error` instead of `Finished`.
    pub fn fail_jobs(&self, fail: bool) {
        self.fail_jobs.store(fail, Ordering::SeqCst);
    }

    /// Leave every submitted job short of a terminal state.
    pub fn stall_jobs(&self, stall: bool) {
        self.stall_jobs.store(stall, Ordering::SeqCst);
    }

    /// Make deletes of the given asset fail.
    pub fn deny_delete_asset(&self, asset_id: impl Into<String>) {
        self.deny_delete.write().insert(asset_id.into());
    }

    /// Replace the processor catalog.
    pub fn set_processors(&self, processors: Vec<Processor>) {
        *self.processors.write() = processors;
    }

    /// Drive a submitted job through its lifecycle, writing outputs and
    /// broadcasting every transition in order.
    async fn drive(self, job_id: String, input_name: String, output_asset_id: String) {
        let fail = self.fail_jobs.load(Ordering::SeqCst);
        let stall = self.stall_jobs.load(Ordering::SeqCst);

        self.step(&job_id, JobState::Queued, JobState::Scheduled).await;
        if stall {
            return;
        }
        self.step(&job_id, JobState::Scheduled, JobState::Processing).await;

        if fail {
            self.step(&job_id, JobState::Processing, JobState::Error).await;
            return;
        }

        // Outputs land before the terminal transition so a Finished job
        // always has a complete bundle.
        if let Err(e) = self.write_outputs(&input_name, &output_asset_id).await {
            tracing::error!(job_id = %job_id, error = %e, "writing encode outputs failed");
            self.step(&job_id, JobState::Processing, JobState::Error).await;
            return;
        }
        self.step(&job_id, JobState::Processing, JobState::Finished).await;
    }

    async fn step(&self, job_id: &str, previous: JobState, current: JobState) {
        tokio::time::sleep(self.step_delay).await;
        debug_assert!(previous.can_transition_to(current));
        if let Some(mut job) = self.jobs.get_mut(job_id) {
            job.state = current;
        }
        debug!(region = %self.region, job_id, %previous, %current, "job state changed");
        // Receivers may be gone; transitions are still recorded on the job.
        let _ = self.event_tx.send(JobEvent {
            job_id: job_id.to_string(),
            transition: JobTransition { previous, current },
        });
    }

    /// Write adaptive renditions and a streaming manifest into the output
    /// asset's container and register them on the asset.
    async fn write_outputs(&self, input_name: &str, output_asset_id: &str) -> Result<()> {
        let container = self
            .assets
            .get(output_asset_id)
            .map(|a| a.container())
            .ok_or_else(|| SpilloverError::AssetNotFound(output_asset_id.to_string()))?;

        let renditions = [
            (format!("{input_name}_400kbps.mp4"), 400u32),
            (format!("{input_name}_1800kbps.mp4"), 1800),
            (format!("{input_name}_3400kbps.mp4"), 3400),
        ];
        for (name, bitrate) in &renditions {
            let data = Bytes::from(format!("{bitrate} kbps rendition of {input_name}"));
            self.store.put_blob(&container, name, data.clone()).await?;
            self.register_file(output_asset_id, AssetFile::new(name, data.len() as u64))
                .await?;
        }

        let manifest_name = format!("{input_name}.ism");
        let manifest = Bytes::from(format!(
            "<smil><body><switch>{input_name}</switch></body></smil>"
        ));
        self.store
            .put_blob(&container, &manifest_name, manifest.clone())
            .await?;
        self.register_file(
            output_asset_id,
            AssetFile {
                name: manifest_name,
                size_bytes: manifest.len() as u64,
                is_primary: true,
            },
        )
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobService for SimJobService {
    async fn pending_count(&self) -> Result<usize> {
        let outages = self.pending_failures.load(Ordering::SeqCst);
        if outages > 0 {
            self.pending_failures.store(outages - 1, Ordering::SeqCst);
            return Err(SpilloverError::RegionUnavailable(format!(
                "simulated queue outage in {}",
                self.region
            )));
        }
        Ok(self.pending.load(Ordering::SeqCst))
    }

    async fn processors(&self) -> Result<Vec<Processor>> {
        Ok(self.processors.read().clone())
    }

    async fn create_asset(&self, name: &str, options: AssetCreationOptions) -> Result<Asset> {
        let asset = Asset::new(name, options);
        self.store.create_container(&asset.container()).await?;
        self.assets.insert(asset.id.clone(), asset.clone());
        debug!(region = %self.region, asset_id = %asset.id, name, "asset created");
        Ok(asset)
    }

    async fn register_file(&self, asset_id: &str, file: AssetFile) -> Result<()> {
        let mut asset = self
            .assets
            .get_mut(asset_id)
            .ok_or_else(|| SpilloverError::AssetNotFound(asset_id.to_string()))?;
        asset.files.retain(|f| f.name != file.name);
        asset.files.push(file);
        Ok(())
    }

    async fn asset(&self, asset_id: &str) -> Result<Asset> {
        self.assets
            .get(asset_id)
            .map(|a| a.clone())
            .ok_or_else(|| SpilloverError::AssetNotFound(asset_id.to_string()))
    }

    async fn submit_job(&self, spec: JobSpec) -> Result<Job> {
        let input = self.asset(&spec.input_asset_id).await?;
        let output = self
            .create_asset(&spec.output_asset_name, spec.output_asset_options)
            .await?;

        let job = Job::new(
            spec.name,
            Task {
                name: "Encoder Task".into(),
                processor_name: spec.processor_name,
                profile: spec.profile,
                input_asset_id: input.id.clone(),
                output_asset_id: output.id.clone(),
            },
        );
        self.jobs.insert(job.id.clone(), job.clone());
        info!(region = %self.region, job_id = %job.id, name = %job.name, "job submitted");

        let driver = self.clone();
        let job_id = job.id.clone();
        tokio::spawn(async move {
            driver.drive(job_id, input.name, output.id).await;
        });

        Ok(job)
    }

    fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    async fn job(&self, job_id: &str) -> Result<Job> {
        self.jobs
            .get(job_id)
            .map(|j| j.clone())
            .ok_or_else(|| SpilloverError::JobNotFound(job_id.to_string()))
    }

    async fn delete_asset(&self, asset_id: &str) -> Result<()> {
        if self.deny_delete.read().contains(asset_id) {
            return Err(SpilloverError::RegionUnavailable(format!(
                "simulated delete failure for asset {asset_id}"
            )));
        }
        let (_, asset) = self
            .assets
            .remove(asset_id)
            .ok_or_else(|| SpilloverError::AssetNotFound(asset_id.to_string()))?;
        self.store.delete_container(&asset.container()).await?;
        debug!(region = %self.region, asset_id, "asset deleted");
        Ok(())
    }

    async fn delete_job(&self, job_id: &str) -> Result<()> {
        self.jobs
            .remove(job_id)
            .map(|_| ())
            .ok_or_else(|| SpilloverError::JobNotFound(job_id.to_string()))?;
        debug!(region = %self.region, job_id, "job deleted");
        Ok(())
    }
}
