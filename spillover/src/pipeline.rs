//! The end-to-end encode flow.
//!
//! One request runs as a single logical flow: upload the local file as a
//! primary-region asset, inspect the primary backlog, route, and either
//! encode in place or round-trip through the backup region. The flow
//! suspends at exactly two points, the bundle copies and the job wait,
//! and copy-back never begins before the job is terminal.

use crate::asset::{qualifies_as_primary, Asset, AssetCreationOptions, AssetFile};
use crate::cleanup::cleanup_backup;
use crate::config::Config;
use crate::error::{Result, SpilloverError};
use crate::job::{Job, JobState};
use crate::orchestrator::{EncodeOrchestrator, TransitionObserver};
use crate::queue;
use crate::region::{route, CopyDirection, RegionContext, RegionRole};
use crate::replicate::{AssetReplicator, TransferOutcome};
use serde::{Deserialize, Serialize};
use spillover_cloud::CopyProgress;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

/// What happened to one encode request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeReport {
    /// The uploaded primary-region input asset.
    pub input_asset: Asset,
    /// Primary backlog observed at routing time.
    pub pending: usize,
    /// Threshold the backlog was compared against.
    pub threshold: usize,
    /// Region the encode ran in.
    pub route: RegionRole,
    /// The job, in its terminal state.
    pub job: Job,
    /// Primary-region asset holding the encoded output.
    pub output_asset_id: String,
    /// Outgoing bundle copy, when the backup route ran.
    pub copy_out: Option<TransferOutcome>,
    /// Returning bundle copy, when the backup route ran.
    pub copy_back: Option<TransferOutcome>,
    /// Whether backup-region artifacts were cleaned up.
    pub cleaned_up: bool,
    /// Wall time of the whole request.
    pub elapsed: Duration,
}

/// Route-specific half of a report.
struct RouteOutcome {
    route: RegionRole,
    job: Job,
    output_asset_id: String,
    copy_out: Option<TransferOutcome>,
    copy_back: Option<TransferOutcome>,
    cleaned_up: bool,
}

/// The overflow-routing encode pipeline.
pub struct Pipeline {
    config: Config,
    primary: RegionContext,
    backup: RegionContext,
    orchestrator: EncodeOrchestrator,
}

impl Pipeline {
    /// Build a pipeline over the two region handles.
    pub fn new(config: Config, primary: RegionContext, backup: RegionContext) -> Self {
        debug_assert_eq!(primary.role, RegionRole::Primary);
        debug_assert_eq!(backup.role, RegionRole::Backup);
        let orchestrator = EncodeOrchestrator::new(config.job_timeout());
        Self {
            config,
            primary,
            backup,
            orchestrator,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one encode request end to end.
    pub async fn run(
        &self,
        path: &Path,
        observer: &dyn TransitionObserver,
        on_progress: &(dyn Fn(&CopyProgress) + Send + Sync),
    ) -> Result<EncodeReport> {
        let started = Instant::now();

        let input_asset = self.upload(path).await?;

        let pending = queue::pending_count(
            &self.primary,
            self.config.region_retries,
            self.config.retry_delay(),
        )
        .await?;
        let chosen = route(pending, self.config.queue_threshold);
        info!(
            pending,
            threshold = self.config.queue_threshold,
            route = %chosen,
            "routing decision"
        );

        let outcome = match chosen {
            RegionRole::Primary => self.encode_in_primary(&input_asset, observer).await?,
            RegionRole::Backup => {
                self.round_trip_through_backup(&input_asset, observer, on_progress)
                    .await?
            }
        };

        Ok(EncodeReport {
            input_asset,
            pending,
            threshold: self.config.queue_threshold,
            route: outcome.route,
            job: outcome.job,
            output_asset_id: outcome.output_asset_id,
            copy_out: outcome.copy_out,
            copy_back: outcome.copy_back,
            cleaned_up: outcome.cleaned_up,
            elapsed: started.elapsed(),
        })
    }

    /// Upload the local file as a fresh primary-region asset named after
    /// the file stem.
    async fn upload(&self, path: &Path) -> Result<Asset> {
        if !path.is_file() {
            return Err(SpilloverError::Input(format!(
                "file does not exist: {}",
                path.display()
            )));
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SpilloverError::Input(format!("unusable path: {}", path.display())))?
            .to_string();
        let stem = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or(&file_name)
            .to_string();

        let data = tokio::fs::read(path).await?;
        let size_bytes = data.len() as u64;

        let asset = self
            .primary
            .jobs
            .create_asset(&stem, AssetCreationOptions::None)
            .await?;
        self.primary
            .store
            .put_blob(&asset.container(), &file_name, data.into())
            .await?;
        self.primary
            .jobs
            .register_file(
                &asset.id,
                AssetFile {
                    is_primary: qualifies_as_primary(&file_name, None),
                    name: file_name.clone(),
                    size_bytes,
                },
            )
            .await?;

        info!(asset_id = %asset.id, file = %file_name, size_bytes, "upload complete");
        self.primary.jobs.asset(&asset.id).await
    }

    async fn encode_in_primary(
        &self,
        input: &Asset,
        observer: &dyn TransitionObserver,
    ) -> Result<RouteOutcome> {
        info!(asset = %input.name, "encoding in the primary region");
        let job = self
            .orchestrator
            .submit_and_wait(
                &self.primary,
                input,
                &self.config.encoder_name,
                &self.config.encode_profile,
                observer,
            )
            .await?;

        Ok(RouteOutcome {
            route: RegionRole::Primary,
            output_asset_id: job.output_asset_id().to_string(),
            job,
            copy_out: None,
            copy_back: None,
            cleaned_up: false,
        })
    }

    async fn round_trip_through_backup(
        &self,
        input: &Asset,
        observer: &dyn TransitionObserver,
        on_progress: &(dyn Fn(&CopyProgress) + Send + Sync),
    ) -> Result<RouteOutcome> {
        let replicator = AssetReplicator::new(&self.primary, &self.backup)
            .with_fallback(self.config.primary_fallback);

        info!(asset = %input.name, "copying input to the backup region");
        let (remote_input, copy_out) = replicator
            .copy_asset(input, CopyDirection::PrimaryToBackup, on_progress)
            .await?;
        Self::require_clean(&copy_out)?;

        info!(asset = %remote_input.name, "encoding in the backup region");
        let job = self
            .orchestrator
            .submit_and_wait(
                &self.backup,
                &remote_input,
                &self.config.encoder_name,
                &self.config.encode_profile,
                observer,
            )
            .await?;

        // A job that did not finish has nothing trustworthy to copy home.
        if job.state != JobState::Finished {
            return Err(SpilloverError::JobTerminalNonSuccess { state: job.state });
        }

        let remote_output = self.backup.jobs.asset(job.output_asset_id()).await?;
        info!(asset = %remote_output.name, "copying encoded output back to the primary region");
        let (home_output, copy_back) = replicator
            .copy_asset(&remote_output, CopyDirection::BackupToPrimary, on_progress)
            .await?;
        Self::require_clean(&copy_back)?;

        let cleaned_up = if self.config.cleanup_backup {
            cleanup_backup(&self.backup, &remote_input, &job).await;
            true
        } else {
            false
        };

        Ok(RouteOutcome {
            route: RegionRole::Backup,
            output_asset_id: home_output.id,
            job,
            copy_out: Some(copy_out),
            copy_back: Some(copy_back),
            cleaned_up,
        })
    }

    fn require_clean(outcome: &TransferOutcome) -> Result<()> {
        if outcome.is_clean() {
            Ok(())
        } else {
            Err(SpilloverError::PartialCopyFailure {
                failed: outcome.files_failed,
                skipped: outcome.files_skipped,
            })
        }
    }
}
