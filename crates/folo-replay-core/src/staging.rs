//! Local staging directories for downloaded and cached-for-upload artifacts.

use crate::config::{RunConfig, StagingConfig};
use crate::error::{ReplayError, Result};
use crate::models::TransferJob;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directories a run stages files in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingDirs {
    /// Scratch space for downloads, shared by all workers of a run.
    pub download_dir: PathBuf,
    /// Cache of files fetched from the original Indy before uploading. Lives
    /// under the persistent mount when one is configured, so re-runs for the
    /// same report skip the fetch.
    pub upload_dir: PathBuf,
}

impl StagingDirs {
    /// Resolve the directories for a report without touching the filesystem.
    pub fn resolve(config: &RunConfig, tracking_id: &str) -> Self {
        let upload_dir = match &config.mount_path {
            Some(mount) => mount.join(tracking_id).join(StagingConfig::UPLOAD_SUBDIR),
            None => config.upload_dir.clone(),
        };
        Self {
            download_dir: config.download_dir.clone(),
            upload_dir,
        }
    }

    /// Resolve and create the directories, purging the upload cache first when
    /// `clear_cache` is set. Dry runs only log what would happen.
    pub fn prepare(config: &RunConfig, tracking_id: &str) -> Result<Self> {
        let dirs = Self::resolve(config, tracking_id);

        if config.dry_run {
            info!(
                "Dry run, would prepare download dir: {}, upload dir: {}",
                dirs.download_dir.display(),
                dirs.upload_dir.display()
            );
            return Ok(dirs);
        }

        if config.clear_cache && dirs.upload_dir.exists() {
            info!("Clearing upload cache {}", dirs.upload_dir.display());
            std::fs::remove_dir_all(&dirs.upload_dir)
                .map_err(|e| ReplayError::io_with_path(e, &dirs.upload_dir))?;
        }

        ensure_dir(&dirs.download_dir, "file downloading")?;
        ensure_dir(&dirs.upload_dir, "caching uploading files")?;

        info!(
            "Prepared download dir: {}, upload dir: {}",
            dirs.download_dir.display(),
            dirs.upload_dir.display()
        );
        Ok(dirs)
    }

    pub fn download_path(&self, job: &TransferJob) -> PathBuf {
        self.download_dir.join(&job.staging_name)
    }

    pub fn upload_cache_path(&self, job: &TransferJob) -> PathBuf {
        self.upload_dir.join(&job.staging_name)
    }
}

fn ensure_dir(dir: &Path, purpose: &str) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| {
        warn!("Cannot create directory {} for {}", dir.display(), purpose);
        ReplayError::Io {
            message: format!("cannot create directory for {}: {}", purpose, e),
            path: Some(dir.to_path_buf()),
            source: Some(e),
        }
    })
}
