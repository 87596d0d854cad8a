//! Run coordinator: one invocation from a tracked content report to a sealed
//! (or migrated) build.

use crate::config::{IndyConfig, RunConfig};
use crate::executor::{BatchOutcome, ExecutionMode, JobAction, TransferExecutor};
use crate::indy::{generic_proxy_store_keys, BuildMeta, HttpIndyService, IndyService};
use crate::migrate::MigrationOrchestrator;
use crate::models::{JobSet, TrackedContent};
use crate::network::{HttpTransport, ProxySettings, Transport};
use crate::remap::{validate_indy_url, Remapper};
use crate::staging::StagingDirs;
use crate::{ReplayError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

const BANNER: &str = "==========================================";

/// Which policy set a run used. Never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Replay,
    Migrate,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Replay => f.write_str("replay"),
            RunMode::Migrate => f.write_str("migrate"),
        }
    }
}

/// What a successful run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub mode: RunMode,
    pub build_id: String,
    pub downloads: Option<BatchOutcome>,
    pub uploads: Option<BatchOutcome>,
    pub migrated: Option<BatchOutcome>,
    /// Seal failures only warn, so a run can succeed unsealed.
    pub sealed: bool,
}

impl RunSummary {
    fn new(mode: RunMode, build_id: &str) -> Self {
        Self {
            mode,
            build_id: build_id.to_string(),
            downloads: None,
            uploads: None,
            migrated: None,
            sealed: false,
        }
    }
}

/// Drives a replay or migration for one build.
pub struct ReplayRunner {
    config: RunConfig,
    transport: Arc<dyn Transport>,
    indy: Arc<dyn IndyService>,
}

impl ReplayRunner {
    pub fn new(config: RunConfig, transport: Arc<dyn Transport>, indy: Arc<dyn IndyService>) -> Self {
        Self {
            config,
            transport,
            indy,
        }
    }

    /// Runner talking to real Indy instances over HTTP.
    pub fn http(config: RunConfig) -> Result<Self> {
        let proxy = config.proxy_url.as_ref().map(|url| ProxySettings {
            url: url.clone(),
            user: config.proxy_user(),
            password: IndyConfig::PROXY_PASSWORD.to_string(),
        });
        let transport = Arc::new(HttpTransport::new(proxy)?);
        let indy = Arc::new(HttpIndyService::new()?);
        Ok(Self::new(config, transport, indy))
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Read the report of `folo_id` from the original Indy.
    pub async fn fetch_report(&self, folo_id: &str) -> Result<TrackedContent> {
        info!("Fetching folo record {} from {}", folo_id, self.config.original_url);
        self.indy
            .get_folo_record(&self.config.original_url, folo_id)
            .await
    }

    /// Replay (or migrate) `report` into the configured build.
    pub async fn run(&self, report: &TrackedContent) -> Result<RunSummary> {
        validate_indy_url(&self.config.original_url)?;
        validate_indy_url(&self.config.target_url)?;
        let migrate_authority = match &self.config.migrate_to {
            Some(dest) => {
                let authority = validate_indy_url(dest)?;
                info!("Migrate to host {}", authority);
                Some(authority)
            }
            None => None,
        };

        let meta = BuildMeta::for_package_type(&self.config.package_type);
        let provisioned = self
            .indy
            .prepare_repos(
                &self.config.target_url,
                &self.config.build_id,
                &meta,
                &self.config.additional_repos,
                self.config.dry_run,
            )
            .await?;
        if !provisioned {
            return Err(ReplayError::Provision {
                message: format!("could not prepare repositories for {}", self.config.build_id),
            });
        }

        let dirs = StagingDirs::prepare(&self.config, report.tracking_id())?;
        let executor = TransferExecutor::new(Arc::clone(&self.transport), dirs, self.config.dry_run);
        let remapper = Remapper::new(&self.config);

        let result = match migrate_authority {
            Some(authority) => self.migrate(report, &remapper, executor, &authority).await,
            None => self.replay(report, &remapper, &executor).await,
        };

        self.clean_generic_proxy_repos(report).await;

        let mut summary = result?;
        if summary.mode == RunMode::Replay && !self.config.dry_run {
            match self.seal().await {
                Ok(()) => summary.sealed = true,
                Err(e) if !e.is_fatal() => warn!("{}", e),
                Err(e) => return Err(e),
            }
        }
        Ok(summary)
    }

    async fn replay(
        &self,
        report: &TrackedContent,
        remapper: &Remapper,
        executor: &TransferExecutor,
    ) -> Result<RunSummary> {
        let mode = ExecutionMode::from_workers(self.config.workers);
        let mut summary = RunSummary::new(RunMode::Replay, &self.config.build_id);

        let downloads = remapper.download_jobs(report);
        if !downloads.is_empty() {
            let outcome = run_phase(executor, "downloads", &downloads, JobAction::Download, mode).await;
            summary.downloads = Some(outcome.into_result("download")?);
        }

        let uploads = remapper.upload_jobs(report);
        if !uploads.is_empty() {
            let outcome = run_phase(executor, "uploads", &uploads, JobAction::CachedUpload, mode).await;
            summary.uploads = Some(outcome.into_result("upload")?);
        }

        Ok(summary)
    }

    async fn migrate(
        &self,
        report: &TrackedContent,
        remapper: &Remapper,
        executor: TransferExecutor,
        authority: &str,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::new(RunMode::Migrate, &self.config.build_id);
        let plan = remapper.migration_plan(report, authority);
        let orchestrator = MigrationOrchestrator::new(
            Arc::clone(&self.transport),
            executor,
            self.config.settle_delay,
            self.config.delete_delay,
            self.config.dry_run,
        );

        info!("Start handling migration artifacts.");
        info!("{}", BANNER);
        let outcome = orchestrator.run(&plan).await;
        info!("{}", BANNER);
        if outcome.is_success() {
            info!("Migration artifacts handling finished.");
        } else {
            warn!("Migration failed, see the logs above for the broken artifacts.");
        }
        summary.migrated = Some(outcome.into_result("migration")?);
        Ok(summary)
    }

    async fn seal(&self) -> Result<()> {
        let build_id = &self.config.build_id;
        match self.indy.seal_folo_record(&self.config.target_url, build_id).await {
            Ok(true) => {
                info!("Folo record sealing succeeded for {}", build_id);
                Ok(())
            }
            Ok(false) => Err(ReplayError::Seal {
                build_id: build_id.clone(),
                message: "Indy refused the request".to_string(),
            }),
            Err(e) => Err(ReplayError::Seal {
                build_id: build_id.clone(),
                message: e.to_string(),
            }),
        }
    }

    /// Drop the per-host stores the generic proxy created for this build.
    async fn clean_generic_proxy_repos(&self, report: &TrackedContent) {
        if !self.config.proxy_enabled() {
            info!("No generic proxy repos to clean up, proxy not enabled.");
            return;
        }
        info!("Clean up generic proxy repos.");
        for key in generic_proxy_store_keys(report, &self.config.build_id) {
            if let Err(e) = self
                .indy
                .delete_store(&self.config.target_url, &key, self.config.dry_run)
                .await
            {
                warn!("Failed to delete generic proxy store {}: {}", key, e);
            }
        }
    }
}

async fn run_phase(
    executor: &TransferExecutor,
    name: &str,
    jobs: &JobSet,
    action: JobAction,
    mode: ExecutionMode,
) -> BatchOutcome {
    info!("Start handling {} artifacts.", name);
    info!("{}", BANNER);
    let outcome = executor.run_batch(jobs, action, mode).await;
    info!("{}", BANNER);
    if outcome.is_success() {
        info!("{} artifacts handling finished, {} of {} done.", name, outcome.succeeded, outcome.total);
    } else {
        warn!(
            "Build test failed due to {} errors ({} of {} broken), see the logs above.",
            name,
            outcome.failures.len(),
            outcome.total
        );
    }
    outcome
}
