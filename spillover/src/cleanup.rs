//! Best-effort teardown of backup-region artifacts.

use crate::asset::Asset;
use crate::job::Job;
use crate::region::RegionContext;
use tracing::{info, warn};

/// Delete the transient backup-region artifacts of a completed round
/// trip: the copied-in input asset, the job's first output asset, and the
/// job itself.
///
/// The three deletions are independent and unordered; a failure on one
/// never prevents the others. Failures are logged and swallowed.
pub async fn cleanup_backup(backup: &RegionContext, backup_asset: &Asset, job: &Job) {
    info!(
        region = %backup.role,
        asset_id = %backup_asset.id,
        job_id = %job.id,
        "cleaning up backup-region artifacts"
    );

    if let Err(e) = backup.jobs.delete_asset(&backup_asset.id).await {
        warn!(asset_id = %backup_asset.id, error = %e, "cleanup: deleting copied-in asset failed");
    }
    if let Err(e) = backup.jobs.delete_asset(job.output_asset_id()).await {
        warn!(asset_id = %job.output_asset_id(), error = %e, "cleanup: deleting output asset failed");
    }
    if let Err(e) = backup.jobs.delete_job(&job.id).await {
        warn!(job_id = %job.id, error = %e, "cleanup: deleting job failed");
    }
}
