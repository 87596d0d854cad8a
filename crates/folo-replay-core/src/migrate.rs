//! Migration of a build's downloads from one Indy to another.
//!
//! The destination is cleaned first: every location a stale copy may live in is
//! deleted, one request at a time with a short pause between requests. Only then
//! are the artifacts relayed, sequentially, stopping at the first failure.

use crate::executor::{BatchOutcome, JobAction, TransferExecutor};
use crate::network::{DeleteOutcome, Transport};
use crate::remap::{DeleteTarget, MigrationPlan};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Counts from the delete phase. Failures never stop the migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub deleted: usize,
    pub not_found: usize,
    pub failed: usize,
}

/// Runs a [`MigrationPlan`].
pub struct MigrationOrchestrator {
    transport: Arc<dyn Transport>,
    executor: TransferExecutor,
    settle_delay: Duration,
    delete_delay: Duration,
    dry_run: bool,
}

impl MigrationOrchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        executor: TransferExecutor,
        settle_delay: Duration,
        delete_delay: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            transport,
            executor,
            settle_delay,
            delete_delay,
            dry_run,
        }
    }

    /// Wait for the settle delay, purge the destination, then relay every job.
    pub async fn run(&self, plan: &MigrationPlan) -> BatchOutcome {
        if !self.settle_delay.is_zero() {
            info!(
                "Waiting {}s for the tracking record to settle before migrating",
                self.settle_delay.as_secs()
            );
            tokio::time::sleep(self.settle_delay).await;
        }

        let summary = self.delete_phase(&plan.deletes).await;
        info!(
            "Delete phase done, deleted: {}, not found: {}, failed: {}",
            summary.deleted, summary.not_found, summary.failed
        );

        self.executor.run_sequential(&plan.jobs, JobAction::Relay).await
    }

    /// Delete every target in order. A 404 counts as already clean.
    pub async fn delete_phase(&self, targets: &[DeleteTarget]) -> DeleteSummary {
        let mut summary = DeleteSummary::default();

        for target in targets {
            if self.dry_run {
                info!("Dry run delete, path: {}, url: {}", target.path, target.url);
                continue;
            }

            match self.transport.delete(&target.url).await {
                Ok(DeleteOutcome::Deleted) => {
                    info!("Deleted {}", target.url);
                    summary.deleted += 1;
                }
                Ok(DeleteOutcome::NotFound) => summary.not_found += 1,
                Err(e) => {
                    warn!("Failed to delete {} ({}): {}", target.path, target.url, e);
                    summary.failed += 1;
                }
            }

            if !self.delete_delay.is_zero() {
                tokio::time::sleep(self.delete_delay).await;
            }
        }

        summary
    }
}
