//! Centralized configuration for folo-replay.
//!
//! Constants live on unit structs grouped by concern. Everything that varies per
//! invocation is collected once into [`RunConfig`] and passed down explicitly.

use crate::error::{ReplayError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
    pub const USER_AGENT: &'static str = "folo-replay/0.3";
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
}

/// Local staging directories.
pub struct StagingConfig;

impl StagingConfig {
    /// Dropped after each run.
    pub const DOWNLOAD_DIR: &'static str = "/tmp/download";
    pub const UPLOAD_DIR: &'static str = "/tmp/upload";
    /// Environment variable naming a persistent mount for the upload cache.
    pub const MOUNT_PATH_ENV: &'static str = "TEST_MOUNT_PATH";
    pub const UPLOAD_SUBDIR: &'static str = "upload";
}

/// Migration timing.
pub struct MigrationConfig;

impl MigrationConfig {
    /// Lets the origin finish its own event handling before migration starts.
    pub const SETTLE_DELAY: Duration = Duration::from_secs(120);
    /// Pause after each delete on the migration destination.
    pub const DELETE_DELAY: Duration = Duration::from_millis(100);
}

/// Indy naming conventions.
pub struct IndyConfig;

impl IndyConfig {
    pub const BUILD_NAME_PREFIX: &'static str = "build-";
    pub const TRACKING_SUFFIX: &'static str = "+tracking";
    pub const PROXY_PASSWORD: &'static str = "pass";
    pub const SHARED_IMPORTS: &'static str = "shared-imports";
    pub const PNC_BUILDS: &'static str = "pnc-builds";
    pub const GENERIC_HTTP: &'static str = "generic-http";
}

/// Everything one invocation needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub original_url: String,
    pub target_url: String,
    pub proxy_url: Option<String>,
    pub migrate_to: Option<String>,
    pub package_type: String,
    pub build_id: String,
    pub additional_repos: Vec<String>,
    pub workers: usize,
    pub clear_cache: bool,
    pub dry_run: bool,
    pub download_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub mount_path: Option<PathBuf>,
    pub settle_delay: Duration,
    pub delete_delay: Duration,
}

impl RunConfig {
    /// Start building a config with the mandatory fields.
    pub fn builder(
        original_url: impl Into<String>,
        target_url: impl Into<String>,
        package_type: impl Into<String>,
        build_id: impl Into<String>,
    ) -> RunConfigBuilder {
        RunConfigBuilder {
            config: RunConfig {
                original_url: original_url.into(),
                target_url: target_url.into(),
                proxy_url: None,
                migrate_to: None,
                package_type: package_type.into(),
                build_id: build_id.into(),
                additional_repos: Vec::new(),
                workers: 1,
                clear_cache: false,
                dry_run: false,
                download_dir: PathBuf::from(StagingConfig::DOWNLOAD_DIR),
                upload_dir: PathBuf::from(StagingConfig::UPLOAD_DIR),
                mount_path: None,
                settle_delay: MigrationConfig::SETTLE_DELAY,
                delete_delay: MigrationConfig::DELETE_DELAY,
            },
        }
    }

    pub fn proxy_enabled(&self) -> bool {
        self.proxy_url.is_some()
    }

    pub fn migrate_enabled(&self) -> bool {
        self.migrate_to.is_some()
    }

    /// Build number used when rewriting upload versions (`build-1234` -> `1234`).
    pub fn version_suffix(&self) -> &str {
        self.build_id
            .strip_prefix(IndyConfig::BUILD_NAME_PREFIX)
            .unwrap_or(&self.build_id)
    }

    /// Proxy user that ties generic-proxy traffic to the build's tracking record.
    pub fn proxy_user(&self) -> String {
        format!("{}{}", self.build_id, IndyConfig::TRACKING_SUFFIX)
    }
}

/// Builder for [`RunConfig`].
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    /// Fetch generic-proxy downloads through this Indy proxy.
    pub fn proxy_url(mut self, url: Option<String>) -> Self {
        self.config.proxy_url = url.filter(|u| !u.is_empty());
        self
    }

    /// Migrate downloads to this Indy instead of replaying the build.
    pub fn migrate_to(mut self, url: Option<String>) -> Self {
        self.config.migrate_to = url.filter(|u| !u.is_empty());
        self
    }

    pub fn additional_repos(mut self, repos: Vec<String>) -> Self {
        self.config.additional_repos = repos;
        self
    }

    /// Worker count; 1 or less runs batches sequentially.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn clear_cache(mut self, clear: bool) -> Self {
        self.config.clear_cache = clear;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.download_dir = dir.into();
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn mount_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.mount_path = path;
        self
    }

    /// Read the persistent upload-cache mount from the environment.
    ///
    /// This is the only place the process environment is consulted.
    pub fn with_mount_path_from_env(self) -> Self {
        let path = std::env::var_os(StagingConfig::MOUNT_PATH_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        self.mount_path(path)
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    pub fn delete_delay(mut self, delay: Duration) -> Self {
        self.config.delete_delay = delay;
        self
    }

    /// Validate and produce the config.
    pub fn build(self) -> Result<RunConfig> {
        let config = self.config;
        if config.package_type.trim().is_empty() {
            return Err(ReplayError::Config {
                message: "package type must not be empty".to_string(),
            });
        }
        if config.build_id.trim().is_empty() {
            return Err(ReplayError::Config {
                message: "build id must not be empty".to_string(),
            });
        }
        if config.original_url.trim().is_empty() || config.target_url.trim().is_empty() {
            return Err(ReplayError::Config {
                message: "original and target Indy URLs are required".to_string(),
            });
        }
        Ok(config)
    }
}
