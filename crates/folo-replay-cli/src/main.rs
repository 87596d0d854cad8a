//! folo-replay - replay a build's tracked content into a fresh Indy build, or
//! migrate it to another Indy.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use folo_replay_core::{generate_build_name, ReplayRunner, RunConfig, RunSummary, TrackedContent};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "folo-replay")]
#[command(about = "Replay or migrate folo tracked content between Indy instances")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay the downloads and uploads recorded under a folo id
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// Indy the tracked build ran against
    original: String,

    /// Indy the build is replayed into
    target: String,

    /// Folo tracking id of the original build
    folo_id: String,

    /// Package type of the build group
    #[arg(short = 't', long, default_value = "maven")]
    package_type: String,

    /// Name of the new build (random `build-NNNNNN` when omitted)
    #[arg(short, long)]
    build_id: Option<String>,

    /// Indy generic HTTP proxy used for GENERIC_PROXY downloads
    #[arg(long)]
    proxy: Option<String>,

    /// Migrate the downloads to this Indy instead of replaying
    #[arg(long)]
    migrate_to: Option<String>,

    /// Extra store keys added to the build group (repeatable)
    #[arg(long = "additional-repo")]
    additional_repos: Vec<String>,

    /// Concurrent transfers; 1 runs sequentially and stops at the first failure
    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    /// Purge the upload cache before running
    #[arg(long)]
    clear_cache: bool,

    /// Log what would be transferred without touching anything
    #[arg(long)]
    dry_run: bool,

    /// Read the tracked content report from a file instead of the original Indy
    #[arg(long)]
    report: Option<PathBuf>,
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();
}

fn build_config(args: &ReplayArgs) -> Result<RunConfig> {
    let build_id = args.build_id.clone().unwrap_or_else(generate_build_name);
    let config = RunConfig::builder(&args.original, &args.target, &args.package_type, build_id)
        .proxy_url(args.proxy.clone())
        .migrate_to(args.migrate_to.clone())
        .additional_repos(args.additional_repos.clone())
        .workers(args.workers)
        .clear_cache(args.clear_cache)
        .dry_run(args.dry_run)
        .with_mount_path_from_env()
        .build()?;
    Ok(config)
}

async fn replay(args: ReplayArgs) -> Result<RunSummary> {
    let config = build_config(&args)?;
    info!(
        "Replaying {} from {} into {} as {}",
        args.folo_id, config.original_url, config.target_url, config.build_id
    );
    let runner = ReplayRunner::http(config)?;

    let report = match &args.report {
        Some(path) => TrackedContent::from_file(path)
            .with_context(|| format!("Failed to load report {}", path.display()))?,
        None => runner
            .fetch_report(&args.folo_id)
            .await
            .with_context(|| format!("Failed to fetch folo record {}", args.folo_id))?,
    };

    let summary = runner.run(&report).await?;
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!("==========================================");
    println!("Build {} {} finished", summary.build_id, summary.mode);
    for (name, outcome) in [
        ("downloads", &summary.downloads),
        ("uploads", &summary.uploads),
        ("migrated", &summary.migrated),
    ] {
        if let Some(outcome) = outcome {
            println!("  {}: {}/{}", name, outcome.succeeded, outcome.total);
        }
    }
    println!("  sealed: {}", summary.sealed);
    println!("==========================================");
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let result = match cli.command {
        Command::Replay(args) => replay(args).await,
    };

    match result {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            println!("Build test failed, please see the logs above for details.");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ReplayArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Replay(args) => args,
        }
    }

    #[test]
    fn test_replay_defaults() {
        let args = parse(&["folo-replay", "replay", "indy-a:8080", "indy-b:8080", "build-100"]);
        assert_eq!(args.original, "indy-a:8080");
        assert_eq!(args.target, "indy-b:8080");
        assert_eq!(args.folo_id, "build-100");
        assert_eq!(args.package_type, "maven");
        assert_eq!(args.workers, 1);
        assert!(args.build_id.is_none());
        assert!(args.additional_repos.is_empty());
        assert!(!args.dry_run);
        assert!(!args.clear_cache);
    }

    #[test]
    fn test_replay_all_flags() {
        let args = parse(&[
            "folo-replay",
            "--debug",
            "replay",
            "indy-a",
            "indy-b",
            "build-100",
            "--package-type",
            "npm",
            "--build-id",
            "build-7",
            "--proxy",
            "http://indy-b:8081",
            "--additional-repo",
            "npm:hosted:extra",
            "--additional-repo",
            "maven:remote:central",
            "--workers",
            "4",
            "--clear-cache",
            "--dry-run",
            "--report",
            "/tmp/report.json",
        ]);
        assert_eq!(args.package_type, "npm");
        assert_eq!(args.build_id.as_deref(), Some("build-7"));
        assert_eq!(args.proxy.as_deref(), Some("http://indy-b:8081"));
        assert_eq!(args.additional_repos, vec!["npm:hosted:extra", "maven:remote:central"]);
        assert_eq!(args.workers, 4);
        assert!(args.clear_cache);
        assert!(args.dry_run);
        assert_eq!(args.report, Some(PathBuf::from("/tmp/report.json")));
    }

    #[test]
    fn test_missing_positional_is_rejected() {
        assert!(Cli::try_parse_from(["folo-replay", "replay", "indy-a", "indy-b"]).is_err());
    }

    #[test]
    fn test_build_config_generates_build_name() {
        let args = parse(&["folo-replay", "replay", "indy-a", "indy-b", "build-100"]);
        let config = build_config(&args).unwrap();
        assert!(config.build_id.starts_with("build-"));
        assert!(!config.migrate_enabled());
        assert!(!config.proxy_enabled());
    }

    #[test]
    fn test_build_config_carries_migration_target() {
        let args = parse(&[
            "folo-replay",
            "replay",
            "indy-a",
            "indy-b",
            "build-100",
            "--build-id",
            "build-7",
            "--migrate-to",
            "indy-c:8080",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.build_id, "build-7");
        assert_eq!(config.migrate_to.as_deref(), Some("indy-c:8080"));
    }
}
