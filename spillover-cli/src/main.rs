//! Spillover CLI - overflow-routed video encoding across two datacenters.

use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use spillover::{
    Config, EncodeReport, JobState, JobTransition, Pipeline, RegionContext, RegionRole,
    SimJobService, TransitionObserver,
};
use spillover_cloud::CopyProgress;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Output mode for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    /// Normal output with progress bar.
    Normal,
    /// JSON report for programmatic parsing.
    Json,
    /// Quiet mode with minimal output.
    Quiet,
    /// Verbose mode with per-transition detail.
    Verbose,
}

/// Command-line arguments for the spillover tool.
#[derive(Parser, Debug)]
#[command(name = "spillover")]
#[command(version)]
#[command(about = "Route video encodes between two datacenters by queue depth")]
#[command(long_about = "Spillover uploads a video to the primary datacenter and checks how many \n\
    encode jobs are already waiting there. Below the threshold (default 3) the \n\
    encode runs in place; at or above it, the input is copied to the backup \n\
    datacenter, encoded there, and the encoded files are copied back into a \n\
    new primary-region asset. Transient backup artifacts are deleted after a \n\
    successful round trip unless --no-cleanup is given.\n\n\
    EXAMPLES:\n    \
    spillover videos/myvideo.mp4\n    \
    spillover videos/myvideo.mp4 --threshold 5\n    \
    spillover videos/myvideo.mp4 --config regions.toml --json")]
struct Args {
    /// Local path of the video file to upload and encode
    input: PathBuf,

    /// Configuration file (default: $SPILLOVER_CONFIG, then spillover.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the overflow threshold
    #[arg(long)]
    threshold: Option<usize>,

    /// Keep backup-region artifacts after a successful round trip
    #[arg(long)]
    no_cleanup: bool,

    /// JSON report on stdout
    #[arg(long, conflicts_with = "quiet", conflicts_with = "verbose")]
    json: bool,

    /// Quiet mode (only print the output asset id on success)
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose output (show every job state transition)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Determine the output mode based on flags.
    fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else if self.verbose {
            OutputMode::Verbose
        } else {
            OutputMode::Normal
        }
    }
}

/// Prints job state transitions as they are observed.
struct ConsoleObserver {
    mode: OutputMode,
}

impl TransitionObserver for ConsoleObserver {
    fn on_transition(&self, _job_id: &str, transition: &JobTransition) {
        match self.mode {
            OutputMode::Quiet | OutputMode::Json => {}
            OutputMode::Normal => {
                if transition.current.is_terminal() {
                    println!("  job {}", state_label(transition.current));
                }
            }
            OutputMode::Verbose => {
                println!(
                    "  job state: {} -> {}",
                    style(transition.previous).dim(),
                    state_label(transition.current)
                );
            }
        }
    }
}

fn state_label(state: JobState) -> console::StyledObject<JobState> {
    match state {
        JobState::Finished => style(state).green(),
        JobState::Error | JobState::Canceled => style(state).red(),
        _ => style(state).cyan(),
    }
}

/// Format a wall-time duration as `HH:MM:SS.cc`.
fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let centis = elapsed.subsec_millis() / 10;
    format!(
        "{:02}:{:02}:{:02}.{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60,
        centis
    )
}

/// Resolve the configuration: explicit path, then $SPILLOVER_CONFIG, then
/// ./spillover.toml, then built-in defaults.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = if let Some(path) = &args.config {
        Config::load(path)?
    } else if let Ok(path) = std::env::var("SPILLOVER_CONFIG") {
        Config::load(path)?
    } else if std::path::Path::new("spillover.toml").is_file() {
        Config::load("spillover.toml")?
    } else {
        debug!("no configuration file found, using defaults");
        Config::default()
    };

    if let Some(threshold) = args.threshold {
        config.queue_threshold = threshold;
    }
    if args.no_cleanup {
        config.cleanup_backup = false;
    }
    Ok(config)
}

/// Build the two region handles from configuration.
///
/// The storage seam is Azure when the `azure` feature is enabled and the
/// in-process store otherwise; job submission runs on the in-process
/// service either way.
#[cfg(feature = "azure")]
fn build_regions(config: &Config) -> anyhow::Result<(RegionContext, RegionContext)> {
    use spillover_cloud::AzureBlobStore;

    config.validate()?;
    let primary_store = Arc::new(AzureBlobStore::from_connection_string(
        &config.primary.storage_connection_string,
    )?);
    let backup_store = Arc::new(AzureBlobStore::from_connection_string(
        &config.backup.storage_connection_string,
    )?);

    let primary_jobs = Arc::new(SimJobService::new(
        RegionRole::Primary,
        primary_store.clone(),
    ));
    let backup_jobs = Arc::new(SimJobService::new(RegionRole::Backup, backup_store.clone()));

    Ok((
        RegionContext::new(RegionRole::Primary, primary_jobs, primary_store),
        RegionContext::new(RegionRole::Backup, backup_jobs, backup_store),
    ))
}

#[cfg(not(feature = "azure"))]
fn build_regions(_config: &Config) -> anyhow::Result<(RegionContext, RegionContext)> {
    use spillover_cloud::MemoryStore;

    let primary_store = Arc::new(MemoryStore::new("primarystore"));
    let backup_store = Arc::new(MemoryStore::new("backupstore"));
    primary_store.link(backup_store.clone());
    backup_store.link(primary_store.clone());

    let primary_jobs = Arc::new(SimJobService::new(
        RegionRole::Primary,
        primary_store.clone(),
    ));
    let backup_jobs = Arc::new(SimJobService::new(RegionRole::Backup, backup_store.clone()));

    Ok((
        RegionContext::new(RegionRole::Primary, primary_jobs, primary_store),
        RegionContext::new(RegionRole::Backup, backup_jobs, backup_store),
    ))
}

fn print_report(report: &EncodeReport, mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputMode::Quiet => {
            println!("{}", report.output_asset_id);
        }
        OutputMode::Normal | OutputMode::Verbose => {
            for (label, transfer) in [("copy out", &report.copy_out), ("copy back", &report.copy_back)]
            {
                if let Some(t) = transfer {
                    println!(
                        "  {label}: elapsed {} files transferred: {} total bytes: {} failed: {} skipped: {}",
                        format_elapsed(t.elapsed),
                        t.files_transferred,
                        t.bytes_transferred,
                        t.files_failed,
                        t.files_skipped
                    );
                }
            }
            if report.cleaned_up {
                println!("  backup artifacts deleted");
            }
            println!(
                "{} encoded in the {} region -> asset {}",
                style("done:").green().bold(),
                report.route,
                report.output_asset_id
            );
            println!("  total time {}", format_elapsed(report.elapsed));
        }
    }
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mode = args.output_mode();
    let config = load_config(&args)?;
    let (primary, backup) = build_regions(&config)?;

    if mode != OutputMode::Json && mode != OutputMode::Quiet {
        println!(
            "uploading {} to the primary datacenter (threshold {})",
            style(args.input.display()).bold(),
            config.queue_threshold
        );
    }

    let progress = if mode == OutputMode::Normal || mode == OutputMode::Verbose {
        let bar = ProgressBar::hidden();
        bar.set_style(
            ProgressStyle::with_template("  {msg} [{bar:30}] {pos}/{len} files")?
                .progress_chars("=> "),
        );
        Some(bar)
    } else {
        None
    };

    let observer = ConsoleObserver { mode };
    let bar = progress.clone();
    let on_progress = move |p: &CopyProgress| {
        if let Some(bar) = &bar {
            if bar.is_hidden() && p.total_files > 0 {
                bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            }
            bar.set_length(p.total_files);
            bar.set_position(p.files_processed());
            bar.set_message("copying");
        }
    };

    let pipeline = Pipeline::new(config, primary, backup);
    let report = pipeline.run(&args.input, &observer, &on_progress).await?;

    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    print_report(&report, mode)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.quiet || args.json {
            tracing_subscriber::EnvFilter::new("warn")
        } else {
            tracing_subscriber::EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        eprintln!("{} {e:#}", style("error:").red().bold());
        std::process::exit(1);
    }
}
