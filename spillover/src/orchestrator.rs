//! Submit-and-wait job orchestration.
//!
//! Submits a one-task encode job against a region and consumes the
//! region's transition stream until the job is terminal. Every observed
//! transition is logged and handed to the caller's observer before the
//! wait continues, in strict order. The wait is bounded; a job that never
//! goes terminal fails with `JobTimeout` instead of hanging the request.

use crate::asset::Asset;
use crate::error::{Result, SpilloverError};
use crate::job::{Job, JobTransition};
use crate::region::RegionContext;
use crate::service::{latest_processor_by_name, JobSpec};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Listener for observed job state changes.
pub trait TransitionObserver: Send + Sync {
    /// Called once per transition, in order, before the wait continues.
    fn on_transition(&self, job_id: &str, transition: &JobTransition);
}

/// Observer that does nothing; transitions are still logged.
pub struct NullObserver;

impl TransitionObserver for NullObserver {
    fn on_transition(&self, _job_id: &str, _transition: &JobTransition) {}
}

/// Submits jobs and waits out their lifecycle.
pub struct EncodeOrchestrator {
    job_timeout: Duration,
}

impl EncodeOrchestrator {
    /// Create an orchestrator with the given bound on the job wait.
    pub fn new(job_timeout: Duration) -> Self {
        Self { job_timeout }
    }

    /// Submit an encode of `input` and block until the job is terminal.
    ///
    /// The job's single task reads `input` and writes a fresh output asset
    /// named `"{input name} {profile}"`. A terminal `Error` or `Canceled`
    /// is returned on the job, not raised; the caller owns that policy.
    pub async fn submit_and_wait(
        &self,
        region: &RegionContext,
        input: &Asset,
        encoder_name: &str,
        profile: &str,
        observer: &dyn TransitionObserver,
    ) -> Result<Job> {
        let processors = region.jobs.processors().await?;
        let processor = latest_processor_by_name(&processors, encoder_name)
            .ok_or_else(|| SpilloverError::ProcessorNotFound(encoder_name.to_string()))?;

        // Subscribe before submitting so no transition is missed.
        let mut events = region.jobs.subscribe();

        let job = region
            .jobs
            .submit_job(JobSpec {
                name: format!("Encoding {}", input.name),
                input_asset_id: input.id.clone(),
                output_asset_name: format!("{} {}", input.name, profile),
                output_asset_options: input.options,
                processor_name: processor.name.clone(),
                profile: profile.to_string(),
            })
            .await?;

        info!(
            region = %region.role,
            job_id = %job.id,
            processor = %processor.name,
            version = %processor.version,
            "encode job submitted"
        );

        let job_id = job.id.clone();
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if event.job_id != job_id {
                            continue;
                        }
                        info!(
                            job_id = %job_id,
                            previous = %event.transition.previous,
                            current = %event.transition.current,
                            "job state changed"
                        );
                        observer.on_transition(&job_id, &event.transition);
                        if event.transition.current.is_terminal() {
                            return Ok(());
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(job_id = %job_id, skipped, "transition stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(SpilloverError::RegionUnavailable(
                            "transition stream closed".into(),
                        ));
                    }
                }
            }
        };

        match tokio::time::timeout(self.job_timeout, wait).await {
            Ok(Ok(())) => region.jobs.job(&job.id).await,
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SpilloverError::JobTimeout(self.job_timeout)),
        }
    }
}
