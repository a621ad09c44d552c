//! End-to-end scenarios against the in-process service and store.

use spillover::orchestrator::NullObserver;
use spillover::{
    Config, JobService, JobState, Pipeline, RegionContext, RegionRole, SimJobService,
    SpilloverError,
};
use spillover_cloud::{CopyProgress, MemoryStore};
use std::path::PathBuf;
use std::sync::Arc;

struct TestEnv {
    pipeline: Pipeline,
    primary_sim: SimJobService,
    backup_sim: SimJobService,
    primary_store: Arc<MemoryStore>,
    input: PathBuf,
    _dir: tempfile::TempDir,
}

fn test_config() -> Config {
    Config {
        job_timeout_secs: 5,
        retry_delay_ms: 1,
        ..Config::default()
    }
}

fn env(config: Config) -> TestEnv {
    let primary_store = Arc::new(MemoryStore::new("primarystore"));
    let backup_store = Arc::new(MemoryStore::new("backupstore"));
    primary_store.link(backup_store.clone());
    backup_store.link(primary_store.clone());

    let primary_sim = SimJobService::new(RegionRole::Primary, primary_store.clone());
    let backup_sim = SimJobService::new(RegionRole::Backup, backup_store.clone());

    let primary = RegionContext::new(
        RegionRole::Primary,
        Arc::new(primary_sim.clone()),
        primary_store.clone(),
    );
    let backup = RegionContext::new(
        RegionRole::Backup,
        Arc::new(backup_sim.clone()),
        backup_store,
    );

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("movie.mp4");
    std::fs::write(&input, b"not really frames, but enough of them").unwrap();

    TestEnv {
        pipeline: Pipeline::new(config, primary, backup),
        primary_sim,
        backup_sim,
        primary_store,
        input,
        _dir: dir,
    }
}

fn no_progress(_: &CopyProgress) {}

#[tokio::test]
async fn primary_route_runs_in_place() {
    let env = env(test_config());
    env.primary_sim.set_pending(1);

    let report = env
        .pipeline
        .run(&env.input, &NullObserver, &no_progress)
        .await
        .unwrap();

    assert_eq!(report.route, RegionRole::Primary);
    assert_eq!(report.pending, 1);
    assert_eq!(report.job.state, JobState::Finished);
    // The job consumed the uploaded asset directly; nothing was copied
    // and nothing was cleaned up.
    assert_eq!(report.job.task().input_asset_id, report.input_asset.id);
    assert!(report.copy_out.is_none());
    assert!(report.copy_back.is_none());
    assert!(!report.cleaned_up);

    let output = env
        .primary_sim
        .asset(&report.output_asset_id)
        .await
        .unwrap();
    assert_eq!(output.primary_file().unwrap().name, "movie.ism");
}

#[tokio::test]
async fn backlog_overflows_to_backup_and_returns_home() {
    let env = env(test_config());
    env.primary_sim.set_pending(5);

    let report = env
        .pipeline
        .run(&env.input, &NullObserver, &no_progress)
        .await
        .unwrap();

    assert_eq!(report.route, RegionRole::Backup);
    assert_eq!(report.job.state, JobState::Finished);
    assert!(report.copy_out.unwrap().is_clean());
    let copy_back = report.copy_back.unwrap();
    assert!(copy_back.is_clean());
    // Three renditions plus the manifest came home.
    assert_eq!(copy_back.files_transferred, 4);

    // The encoded bundle now lives in the primary region, manifest primary.
    let output = env
        .primary_sim
        .asset(&report.output_asset_id)
        .await
        .unwrap();
    assert_eq!(output.files.len(), 4);
    assert_eq!(output.primary_file().unwrap().name, "movie.ism");

    // All three backup artifacts are gone.
    assert!(report.cleaned_up);
    let remote_input_id = &report.job.task().input_asset_id;
    assert!(env.backup_sim.asset(remote_input_id).await.is_err());
    assert!(env
        .backup_sim
        .asset(report.job.output_asset_id())
        .await
        .is_err());
    assert!(env.backup_sim.job(&report.job.id).await.is_err());
}

#[tokio::test]
async fn cleanup_can_be_disabled() {
    let env = env(Config {
        cleanup_backup: false,
        ..test_config()
    });
    env.primary_sim.set_pending(5);

    let report = env
        .pipeline
        .run(&env.input, &NullObserver, &no_progress)
        .await
        .unwrap();

    assert!(!report.cleaned_up);
    // Backup artifacts survive.
    assert!(env
        .backup_sim
        .asset(&report.job.task().input_asset_id)
        .await
        .is_ok());
    assert!(env.backup_sim.job(&report.job.id).await.is_ok());
}

#[tokio::test]
async fn failed_backup_job_aborts_copy_back() {
    let env = env(test_config());
    env.primary_sim.set_pending(5);
    env.backup_sim.fail_jobs(true);

    let err = env
        .pipeline
        .run(&env.input, &NullObserver, &no_progress)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SpilloverError::JobTerminalNonSuccess {
            state: JobState::Error
        }
    ));
}

#[tokio::test]
async fn partial_copy_out_aborts_the_request() {
    let env = env(test_config());
    env.primary_sim.set_pending(5);
    env.primary_store.poison_name("movie.mp4");

    let err = env
        .pipeline
        .run(&env.input, &NullObserver, &no_progress)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SpilloverError::PartialCopyFailure { failed: 1, .. }
    ));
}

#[tokio::test]
async fn queue_outage_fails_after_retries() {
    let env = env(Config {
        region_retries: 2,
        ..test_config()
    });
    env.primary_sim.fail_next_pending(10);

    let err = env
        .pipeline
        .run(&env.input, &NullObserver, &no_progress)
        .await
        .unwrap_err();
    assert!(matches!(err, SpilloverError::RegionUnavailable(_)));
}

#[tokio::test]
async fn queue_outage_within_retry_budget_recovers() {
    let env = env(test_config());
    env.primary_sim.set_pending(0);
    env.primary_sim.fail_next_pending(1);

    let report = env
        .pipeline
        .run(&env.input, &NullObserver, &no_progress)
        .await
        .unwrap();
    assert_eq!(report.route, RegionRole::Primary);
}

#[tokio::test]
async fn stalled_backup_job_times_out() {
    let env = env(Config {
        job_timeout_secs: 1,
        ..test_config()
    });
    env.primary_sim.set_pending(5);
    env.backup_sim.stall_jobs(true);

    let err = env
        .pipeline
        .run(&env.input, &NullObserver, &no_progress)
        .await
        .unwrap_err();
    assert!(matches!(err, SpilloverError::JobTimeout(_)));
}

#[tokio::test]
async fn missing_input_is_rejected() {
    let env = env(test_config());
    let missing = env.input.with_file_name("nope.mp4");

    let err = env
        .pipeline
        .run(&missing, &NullObserver, &no_progress)
        .await
        .unwrap_err();
    assert!(matches!(err, SpilloverError::Input(_)));
}
