//! URL remapping: turn tracked entries into transfer jobs.
//!
//! Three policies are supported:
//! - replay download: fetch every recorded download from the target Indy
//! - replay upload: copy every recorded upload from the original Indy into the new build
//! - migrate: move downloads from the target Indy to another Indy, after
//!   deleting stale copies there
//!
//! Nothing in here performs I/O. Entries that cannot be remapped degrade to a job
//! with an empty destination, which the executor reports as failed.

mod urls;
mod version;

pub use urls::{
    build_url, normalize_base_url, repo_name_for_origin, set_hostname, validate_indy_url,
};
pub use version::alter_upload_path;

use crate::config::{IndyConfig, RunConfig};
use crate::models::{Endpoint, JobSet, TrackedContent, TrackedContentEntry, TransferJob};
use tracing::{debug, warn};

const GENERIC_REMOTE_PREFIX: &str = "generic-http/remote/r-";
const GENERIC_HOSTED_PREFIX: &str = "generic-http/hosted/h-";

/// Generic remote repos may be gone by replay time; their content was promoted
/// into the matching `h-` hosted repo.
pub fn remote_to_hosted(store_path: &str) -> String {
    store_path.replacen(GENERIC_REMOTE_PREFIX, GENERIC_HOSTED_PREFIX, 1)
}

/// Store keys whose content is also promoted into `hosted/shared-imports`.
const SHARED_IMPORTS_ALIASES: &[&str] = &["npm:remote:npmjs", "maven:remote:central"];
/// Store keys whose content is also promoted into `hosted/pnc-builds`.
const PNC_BUILDS_ALIASES: &[&str] = &["maven:remote:mrrc-ga-rh"];
const PNC_BUILD_HOSTED_PREFIX: &str = "maven:hosted:build-";

/// Where on the migration destination a stale copy may live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTarget {
    /// Artifact path the target belongs to.
    pub path: String,
    /// Empty when it could not be computed.
    pub url: String,
}

/// Everything the migration orchestrator needs for one report.
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    /// Deletes in report order; duplicated paths contribute all their targets.
    pub deletes: Vec<DeleteTarget>,
    pub jobs: JobSet,
}

/// Computes transfer jobs for one run.
#[derive(Debug, Clone)]
pub struct Remapper {
    original: String,
    target: String,
    build_id: String,
    package_type: String,
    version_suffix: String,
    additional_repos: Vec<String>,
    proxy_enabled: bool,
}

impl Remapper {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            original: normalize_base_url(&config.original_url),
            target: normalize_base_url(&config.target_url),
            build_id: config.build_id.clone(),
            package_type: config.package_type.clone(),
            version_suffix: config.version_suffix().to_string(),
            additional_repos: config.additional_repos.clone(),
            proxy_enabled: config.proxy_enabled(),
        }
    }

    /// Normalized target base URL.
    pub fn target_base(&self) -> &str {
        &self.target
    }

    fn matches_package_type(&self, store_key: &str) -> bool {
        store_key.starts_with(&self.package_type)
    }

    /// Fetch URL on the target Indy for a recorded download.
    pub fn download_job(&self, entry: &TrackedContentEntry) -> TransferJob {
        let repo_path = entry.store_path();

        let source = if entry.is_generic_proxy() {
            if self.proxy_enabled {
                match entry.origin_url.as_deref().filter(|u| !u.is_empty()) {
                    Some(origin) => Endpoint::Proxied(origin.to_string()),
                    None => {
                        warn!("Generic proxy download {} has no origin URL", entry.path);
                        Endpoint::Proxied(String::new())
                    }
                }
            } else {
                let repo_path = remote_to_hosted(&repo_path);
                Endpoint::Direct(build_url(&self.target, &["api/content", &repo_path, &entry.path]))
            }
        } else if self.additional_repos.contains(&entry.store_key)
            || !self.matches_package_type(&entry.store_key)
        {
            // Cross-ecosystem downloads (npm build pulling from maven) or explicitly
            // listed repos resolve against their own store.
            Endpoint::Direct(build_url(
                &self.target,
                &["api/folo/track", &self.build_id, &repo_path, &entry.path],
            ))
        } else {
            Endpoint::Direct(build_url(
                &self.target,
                &[
                    "api/folo/track",
                    &self.build_id,
                    &self.package_type,
                    "group",
                    &self.build_id,
                    &entry.path,
                ],
            ))
        };

        TransferJob::download(&entry.path, &entry.store_key, &entry.md5, source)
    }

    /// Jobs for every download in the report.
    pub fn download_jobs(&self, report: &TrackedContent) -> JobSet {
        let jobs: JobSet = report.downloads.iter().map(|d| self.download_job(d)).collect();
        debug!("Prepared {} download jobs", jobs.len());
        jobs
    }

    /// Source on the original Indy and destination in the new build for an upload.
    pub fn upload_job(&self, entry: &TrackedContentEntry) -> TransferJob {
        let store_path = entry.store_path();
        let source = build_url(&self.original, &["api/content", &store_path, &entry.path]);

        let altered = alter_upload_path(&entry.path, &entry.store_key, &self.version_suffix);
        let toks: Vec<&str> = store_path.split('/').filter(|t| !t.is_empty()).collect();
        let destination = if toks.len() >= 2 {
            build_url(
                &self.target,
                &["api/folo/track", &self.build_id, toks[0], toks[1], &self.build_id, &altered],
            )
        } else {
            warn!("Upload {} has malformed store key {:?}", entry.path, entry.store_key);
            String::new()
        };

        TransferJob::relay(
            &entry.path,
            &entry.store_key,
            &entry.md5,
            Endpoint::Direct(source),
            destination,
        )
    }

    /// Jobs for every upload in the report.
    pub fn upload_jobs(&self, report: &TrackedContent) -> JobSet {
        let jobs: JobSet = report.uploads.iter().map(|u| self.upload_job(u)).collect();
        debug!("Prepared {} upload jobs", jobs.len());
        jobs
    }

    /// Current location of a download on the target Indy, as served content.
    fn migration_source(&self, entry: &TrackedContentEntry) -> String {
        let repo_path = entry.store_path();
        if entry.is_generic_proxy() {
            build_url(&self.target, &["api/content", &remote_to_hosted(&repo_path), &entry.path])
        } else if !self.matches_package_type(&entry.store_key) {
            build_url(&self.target, &["api/content", &repo_path, &entry.path])
        } else {
            build_url(
                &self.target,
                &["api/content", &self.package_type, "group", &self.build_id, &entry.path],
            )
        }
    }

    fn destination_hosted_url(&self, dest_base: &str, repo: &str, path: &str) -> String {
        build_url(dest_base, &["api/content", &self.package_type, "hosted", repo, path])
    }

    /// Migration job plus every path to purge on the destination first.
    ///
    /// The job uploads to the promotion store (`shared-imports` or `pnc-builds`)
    /// when the entry's store is promoted into one, otherwise to the
    /// hostname-substituted local URL. `dest_authority` is the `host[:port]` of
    /// the migration destination.
    pub fn migration_entry(
        &self,
        entry: &TrackedContentEntry,
        dest_authority: &str,
    ) -> (TransferJob, Vec<DeleteTarget>) {
        let dest_base = normalize_base_url(dest_authority);
        let source = self.migration_source(entry);

        let primary = entry
            .local_url
            .as_deref()
            .and_then(|local| set_hostname(local, dest_authority))
            .unwrap_or_else(|| {
                warn!("Download {} has no usable local URL", entry.path);
                String::new()
            });

        let mut urls = vec![primary.clone()];
        let shared_suffix = format!(":hosted:{}", IndyConfig::SHARED_IMPORTS);
        if !entry.store_key.ends_with(&shared_suffix) {
            urls.push(self.destination_hosted_url(&dest_base, IndyConfig::SHARED_IMPORTS, &entry.path));
        }
        // Content of these stores is promoted on the destination, so the
        // promotion target is also where the artifact gets re-uploaded.
        let promoted = if SHARED_IMPORTS_ALIASES.contains(&entry.store_key.as_str()) {
            Some(self.destination_hosted_url(&dest_base, IndyConfig::SHARED_IMPORTS, &entry.path))
        } else if PNC_BUILDS_ALIASES.contains(&entry.store_key.as_str())
            || entry.store_key.starts_with(PNC_BUILD_HOSTED_PREFIX)
        {
            Some(self.destination_hosted_url(&dest_base, IndyConfig::PNC_BUILDS, &entry.path))
        } else {
            None
        };
        if let Some(url) = &promoted {
            urls.push(url.clone());
        }

        let mut deletes: Vec<DeleteTarget> = Vec::with_capacity(urls.len());
        for url in urls {
            if !url.is_empty() && deletes.iter().any(|d| d.url == url) {
                continue;
            }
            deletes.push(DeleteTarget {
                path: entry.path.clone(),
                url,
            });
        }

        let job = TransferJob::relay(
            &entry.path,
            &entry.store_key,
            &entry.md5,
            Endpoint::Direct(source),
            promoted.unwrap_or(primary),
        );
        (job, deletes)
    }

    /// Migration plan for every download in the report.
    pub fn migration_plan(&self, report: &TrackedContent, dest_authority: &str) -> MigrationPlan {
        let mut plan = MigrationPlan::default();
        for entry in &report.downloads {
            let (job, deletes) = self.migration_entry(entry, dest_authority);
            plan.deletes.extend(deletes);
            plan.jobs.insert(job);
        }
        debug!(
            "Prepared {} migration jobs with {} delete targets",
            plan.jobs.len(),
            plan.deletes.len()
        );
        plan
    }
}
