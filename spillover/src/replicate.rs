//! Cross-region asset replication.
//!
//! Copies a whole asset bundle between the two regions' storage accounts,
//! server-side, then re-registers the copied files as a logical asset in
//! the destination region and re-designates the primary file.

use crate::asset::{qualifies_as_primary, Asset, AssetFile, PrimaryFallback};
use crate::error::Result;
use crate::region::{CopyDirection, RegionContext, RegionRole};
use serde::{Deserialize, Serialize};
use spillover_cloud::CopyProgress;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Outcome of one bundle copy. Partial failure is data, not an error;
/// callers must check the failed count rather than rely on an `Err`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TransferOutcome {
    /// Files transferred.
    pub files_transferred: u64,
    /// Files skipped because the destination already held them.
    pub files_skipped: u64,
    /// Files that failed to copy.
    pub files_failed: u64,
    /// Bytes moved.
    pub bytes_transferred: u64,
    /// Wall time of the copy.
    pub elapsed: Duration,
}

impl TransferOutcome {
    fn from_progress(progress: &CopyProgress, elapsed: Duration) -> Self {
        Self {
            files_transferred: progress.files_transferred,
            files_skipped: progress.files_skipped,
            files_failed: progress.files_failed,
            bytes_transferred: progress.bytes_transferred,
            elapsed,
        }
    }

    /// Whether every file made it across.
    pub fn is_clean(&self) -> bool {
        self.files_failed == 0
    }
}

/// Copies asset bundles between the primary and backup regions.
pub struct AssetReplicator<'a> {
    primary: &'a RegionContext,
    backup: &'a RegionContext,
    fallback: PrimaryFallback,
}

impl<'a> AssetReplicator<'a> {
    /// Create a replicator over the two region handles.
    pub fn new(primary: &'a RegionContext, backup: &'a RegionContext) -> Self {
        Self {
            primary,
            backup,
            fallback: PrimaryFallback::default(),
        }
    }

    /// Set the policy for bundles where no file qualifies as primary.
    pub fn with_fallback(mut self, fallback: PrimaryFallback) -> Self {
        self.fallback = fallback;
        self
    }

    fn endpoints(&self, direction: CopyDirection) -> (&RegionContext, &RegionContext) {
        match direction.source() {
            RegionRole::Primary => (self.primary, self.backup),
            RegionRole::Backup => (self.backup, self.primary),
        }
    }

    /// Copy `source` to the other region and return the fully-populated
    /// destination asset alongside the transfer counters.
    pub async fn copy_asset(
        &self,
        source: &Asset,
        direction: CopyDirection,
        on_progress: &(dyn Fn(&CopyProgress) + Send + Sync),
    ) -> Result<(Asset, TransferOutcome)> {
        let (src, dst) = self.endpoints(direction);

        info!(
            asset = %source.name,
            from = %src.role,
            to = %dst.role,
            "copying asset bundle"
        );

        // Destination shell with the same name and creation options.
        let dest = dst.jobs.create_asset(&source.name, source.options).await?;
        let source_primary = source.primary_file().map(|f| f.name.clone());

        let started = Instant::now();
        let progress = dst
            .store
            .copy_container_from(
                src.store.as_ref(),
                &source.container(),
                &dest.container(),
                on_progress,
            )
            .await?;
        let outcome = TransferOutcome::from_progress(&progress, started.elapsed());

        info!(
            elapsed = ?outcome.elapsed,
            files_transferred = outcome.files_transferred,
            bytes_transferred = outcome.bytes_transferred,
            files_failed = outcome.files_failed,
            files_skipped = outcome.files_skipped,
            "bundle copy finished"
        );
        if !outcome.is_clean() {
            warn!(
                asset = %source.name,
                files_failed = outcome.files_failed,
                "bundle copy left files behind"
            );
        }

        // Register what actually landed, not what we meant to copy.
        let listed = dst.store.list_blobs(&dest.container()).await?;
        let mut files: Vec<AssetFile> = listed
            .into_iter()
            .filter(|blob| blob.size_bytes > 0)
            .map(|blob| AssetFile::new(blob.name, blob.size_bytes))
            .collect();

        if let Some(idx) = self.designate_primary(&files, source_primary.as_deref()) {
            files[idx].is_primary = true;
        }

        for file in files {
            dst.jobs.register_file(&dest.id, file).await?;
        }

        let dest = dst.jobs.asset(&dest.id).await?;
        Ok((dest, outcome))
    }

    /// Pick the single file to mark primary: a case-insensitive match of
    /// the source's primary name wins, then the first manifest by listing
    /// order, then the configured fallback.
    fn designate_primary(&self, files: &[AssetFile], source_primary: Option<&str>) -> Option<usize> {
        files
            .iter()
            .position(|f| source_primary.is_some_and(|p| f.name.eq_ignore_ascii_case(p)))
            .or_else(|| files.iter().position(|f| qualifies_as_primary(&f.name, None)))
            .or(match self.fallback {
                PrimaryFallback::FirstFile if !files.is_empty() => Some(0),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetCreationOptions;
    use crate::region::RegionRole;
    use crate::service::JobService;
    use crate::sim::SimJobService;
    use bytes::Bytes;
    use spillover_cloud::{BlobStore, MemoryStore};
    use std::sync::Arc;

    struct Env {
        primary: RegionContext,
        backup: RegionContext,
        primary_store: Arc<MemoryStore>,
    }

    fn env() -> Env {
        let primary_store = Arc::new(MemoryStore::new("primarystore"));
        let backup_store = Arc::new(MemoryStore::new("backupstore"));
        primary_store.link(backup_store.clone());
        backup_store.link(primary_store.clone());

        let primary_jobs = SimJobService::new(RegionRole::Primary, primary_store.clone());
        let backup_jobs = SimJobService::new(RegionRole::Backup, backup_store.clone());

        Env {
            primary: RegionContext::new(
                RegionRole::Primary,
                Arc::new(primary_jobs),
                primary_store.clone(),
            ),
            backup: RegionContext::new(RegionRole::Backup, Arc::new(backup_jobs), backup_store),
            primary_store,
        }
    }

    async fn seed_asset(ctx: &RegionContext, files: &[(&str, &[u8], bool)]) -> Asset {
        let asset = ctx
            .jobs
            .create_asset("movie", AssetCreationOptions::None)
            .await
            .unwrap();
        for (name, data, primary) in files {
            ctx.store
                .put_blob(&asset.container(), name, Bytes::copy_from_slice(data))
                .await
                .unwrap();
            ctx.jobs
                .register_file(
                    &asset.id,
                    AssetFile {
                        name: name.to_string(),
                        size_bytes: data.len() as u64,
                        is_primary: *primary,
                    },
                )
                .await
                .unwrap();
        }
        ctx.jobs.asset(&asset.id).await.unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_preserves_names_and_sizes() {
        let env = env();
        let source = seed_asset(
            &env.primary,
            &[
                ("movie.mp4", b"frames-frames", false),
                ("captions/en.vtt", b"cues", false),
                ("manifest.ism", b"<smil/>", true),
            ],
        )
        .await;

        let replicator = AssetReplicator::new(&env.primary, &env.backup);
        let (remote, out) = replicator
            .copy_asset(&source, CopyDirection::PrimaryToBackup, &|_| {})
            .await
            .unwrap();
        assert!(out.is_clean());

        let (home, back) = replicator
            .copy_asset(&remote, CopyDirection::BackupToPrimary, &|_| {})
            .await
            .unwrap();
        assert!(back.is_clean());
        assert_eq!(back.files_transferred, 3);

        assert_ne!(home.id, source.id);
        let mut original: Vec<_> = source.files.iter().map(|f| (&f.name, f.size_bytes)).collect();
        let mut returned: Vec<_> = home.files.iter().map(|f| (&f.name, f.size_bytes)).collect();
        original.sort();
        returned.sort();
        assert_eq!(original, returned);
    }

    #[tokio::test]
    async fn test_manifest_stays_primary() {
        let env = env();
        let source = seed_asset(
            &env.primary,
            &[
                ("movie.mp4", b"frames", false),
                ("manifest.ism", b"<smil/>", true),
            ],
        )
        .await;

        let replicator = AssetReplicator::new(&env.primary, &env.backup);
        let (remote, _) = replicator
            .copy_asset(&source, CopyDirection::PrimaryToBackup, &|_| {})
            .await
            .unwrap();

        let primaries: Vec<_> = remote.files.iter().filter(|f| f.is_primary).collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].name, "manifest.ism");
    }

    #[tokio::test]
    async fn test_source_primary_name_preserved_without_manifest() {
        let env = env();
        let source = seed_asset(
            &env.primary,
            &[
                ("intro.mp4", b"aa", false),
                ("Movie.MP4", b"frames", true),
            ],
        )
        .await;

        let replicator = AssetReplicator::new(&env.primary, &env.backup);
        let (remote, _) = replicator
            .copy_asset(&source, CopyDirection::PrimaryToBackup, &|_| {})
            .await
            .unwrap();

        let primary = remote.primary_file().unwrap();
        assert!(primary.name.eq_ignore_ascii_case("movie.mp4"));
    }

    #[tokio::test]
    async fn test_zero_matches_leaves_no_primary() {
        let env = env();
        // No manifest, no primary on the source bundle.
        let source = seed_asset(
            &env.primary,
            &[("a.mp4", b"aa", false), ("b.mp4", b"bb", false)],
        )
        .await;

        let replicator = AssetReplicator::new(&env.primary, &env.backup);
        let (remote, _) = replicator
            .copy_asset(&source, CopyDirection::PrimaryToBackup, &|_| {})
            .await
            .unwrap();
        assert!(remote.primary_file().is_none());
    }

    #[tokio::test]
    async fn test_first_file_fallback() {
        let env = env();
        let source = seed_asset(
            &env.primary,
            &[("a.mp4", b"aa", false), ("b.mp4", b"bb", false)],
        )
        .await;

        let replicator = AssetReplicator::new(&env.primary, &env.backup)
            .with_fallback(PrimaryFallback::FirstFile);
        let (remote, _) = replicator
            .copy_asset(&source, CopyDirection::PrimaryToBackup, &|_| {})
            .await
            .unwrap();
        assert_eq!(remote.primary_file().unwrap().name, "a.mp4");
    }

    #[tokio::test]
    async fn test_empty_files_not_registered() {
        let env = env();
        let source = seed_asset(
            &env.primary,
            &[("movie.mp4", b"frames", false), ("placeholder", b"", false)],
        )
        .await;

        let replicator = AssetReplicator::new(&env.primary, &env.backup);
        let (remote, _) = replicator
            .copy_asset(&source, CopyDirection::PrimaryToBackup, &|_| {})
            .await
            .unwrap();

        assert_eq!(remote.files.len(), 1);
        assert_eq!(remote.files[0].name, "movie.mp4");
    }

    #[tokio::test]
    async fn test_failed_files_counted_not_raised() {
        let env = env();
        let source = seed_asset(
            &env.primary,
            &[("movie.mp4", b"frames", false), ("bonus.mp4", b"extra", false)],
        )
        .await;
        env.primary_store.poison_blob(source.container(), "bonus.mp4");

        let replicator = AssetReplicator::new(&env.primary, &env.backup);
        let (remote, out) = replicator
            .copy_asset(&source, CopyDirection::PrimaryToBackup, &|_| {})
            .await
            .unwrap();

        assert_eq!(out.files_failed, 1);
        assert_eq!(out.files_transferred, 1);
        assert!(!out.is_clean());
        // Only the file that landed is registered.
        assert_eq!(remote.files.len(), 1);
    }

    #[tokio::test]
    async fn test_progress_reports_cumulative_counts() {
        let env = env();
        let source = seed_asset(
            &env.primary,
            &[("a.mp4", b"aa", false), ("b.mp4", b"bb", false)],
        )
        .await;

        let snapshots = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = snapshots.clone();
        let replicator = AssetReplicator::new(&env.primary, &env.backup);
        replicator
            .copy_asset(&source, CopyDirection::PrimaryToBackup, &move |p| {
                sink.lock().push(*p);
            })
            .await
            .unwrap();

        let seen = snapshots.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].files_processed(), 1);
        assert_eq!(seen[1].files_processed(), 2);
        assert_eq!(seen[1].total_files, 2);
    }
}
