//! Transfer executor: runs a batch of jobs and reports whether all of them made it.
//!
//! Two failure policies exist side by side:
//! - [`ExecutionMode::Sequential`] runs jobs in batch order and stops at the first failure
//! - [`ExecutionMode::Concurrent`] keeps up to N jobs in flight and lets every dispatched
//!   job finish; the batch succeeds only if all of them did
//!
//! Job errors never escape as `Err`: they are logged with their classification
//! and folded into the [`BatchOutcome`].

use crate::error::{ErrorKind, ReplayError, Result};
use crate::hashing::verify_md5_blocking;
use crate::models::{Endpoint, JobSet, TransferJob};
use crate::network::Transport;
use crate::staging::StagingDirs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// What a job does with its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobAction {
    /// Fetch into the download dir and verify.
    Download,
    /// Fetch into the upload cache (or reuse the cached file), verify, upload.
    CachedUpload,
    /// Fetch into the download dir, verify, upload. Used by migration.
    Relay,
}

/// How a batch is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Concurrent(usize),
}

impl ExecutionMode {
    /// One worker or fewer means sequential.
    pub fn from_workers(workers: usize) -> Self {
        if workers > 1 {
            ExecutionMode::Concurrent(workers)
        } else {
            ExecutionMode::Sequential
        }
    }
}

/// One failed job.
#[derive(Debug, Clone)]
pub struct JobFailure {
    pub path: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Aggregate result of a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub total: usize,
    /// Paths of jobs that were started, in start order.
    pub attempted: Vec<String>,
    pub succeeded: usize,
    pub failures: Vec<JobFailure>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Convert into a run-level error named after `phase` when broken.
    pub fn into_result(self, phase: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ReplayError::BatchFailed {
                phase: phase.to_string(),
                failed: self.failures.len(),
                total: self.total,
            })
        }
    }
}

/// Executes transfer jobs against a [`Transport`].
#[derive(Clone)]
pub struct TransferExecutor {
    transport: Arc<dyn Transport>,
    dirs: StagingDirs,
    dry_run: bool,
}

impl TransferExecutor {
    pub fn new(transport: Arc<dyn Transport>, dirs: StagingDirs, dry_run: bool) -> Self {
        Self {
            transport,
            dirs,
            dry_run,
        }
    }

    pub fn staging(&self) -> &StagingDirs {
        &self.dirs
    }

    /// Run a batch in the given mode.
    pub async fn run_batch(&self, jobs: &JobSet, action: JobAction, mode: ExecutionMode) -> BatchOutcome {
        match mode {
            ExecutionMode::Sequential => self.run_sequential(jobs, action).await,
            ExecutionMode::Concurrent(workers) => self.run_concurrent(jobs, action, workers).await,
        }
    }

    /// Jobs in order; the first failure ends the batch.
    pub async fn run_sequential(&self, jobs: &JobSet, action: JobAction) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            total: jobs.len(),
            ..Default::default()
        };

        for job in jobs {
            outcome.attempted.push(job.path.clone());
            match self.run_job(job, action).await {
                Ok(()) => outcome.succeeded += 1,
                Err(e) => {
                    outcome.failures.push(report_failure(job, &e));
                    let skipped = outcome.total - outcome.attempted.len();
                    if skipped > 0 {
                        warn!("Stopping batch, {} remaining jobs not attempted", skipped);
                    }
                    break;
                }
            }
        }

        outcome
    }

    /// Up to `workers` jobs in flight; every job runs to completion.
    pub async fn run_concurrent(&self, jobs: &JobSet, action: JobAction, workers: usize) -> BatchOutcome {
        let mut outcome = BatchOutcome {
            total: jobs.len(),
            ..Default::default()
        };
        let semaphore = Arc::new(Semaphore::new(workers.max(1)));
        let mut join_set: JoinSet<(TransferJob, Result<()>)> = JoinSet::new();

        for job in jobs {
            let executor = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let job = job.clone();
            outcome.attempted.push(job.path.clone());

            join_set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => executor.run_job(&job, action).await,
                    Err(e) => Err(ReplayError::Other(format!("worker pool closed: {}", e))),
                };
                (job, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => outcome.succeeded += 1,
                Ok((job, Err(e))) => outcome.failures.push(report_failure(&job, &e)),
                Err(e) => {
                    error!("Transfer worker panicked: {}", e);
                    outcome.failures.push(JobFailure {
                        path: String::new(),
                        kind: ErrorKind::Run,
                        message: e.to_string(),
                    });
                }
            }
        }

        outcome
    }

    /// Run one job. Dry runs follow the same branches but touch nothing.
    pub async fn run_job(&self, job: &TransferJob, action: JobAction) -> Result<()> {
        match action {
            JobAction::Download => {
                let dest = self.dirs.download_path(job);
                let source = job_source(job)?;
                if self.dry_run {
                    info!("Dry run download, url: {}", source);
                    return Ok(());
                }
                self.fetch(source, &dest).await?;
                verify_md5_blocking(&dest, &job.checksum, &job.path).await
            }
            JobAction::CachedUpload => {
                let cache = self.dirs.upload_cache_path(job);
                let source = job_source(job)?;
                let destination = upload_destination(job)?;
                if self.dry_run {
                    info!(
                        "Dry run upload, source: {}, destination: {}",
                        source, destination
                    );
                    return Ok(());
                }
                if cache.is_file() {
                    info!("File already downloaded, reusing cache file {}", cache.display());
                } else {
                    self.fetch(source, &cache).await?;
                }
                if let Err(e) = verify_md5_blocking(&cache, &job.checksum, &job.path).await {
                    discard_corrupt(&cache, &e);
                    return Err(e);
                }
                self.transport.upload(destination, &cache).await
            }
            JobAction::Relay => {
                let dest = self.dirs.download_path(job);
                let source = job_source(job)?;
                let destination = upload_destination(job)?;
                if self.dry_run {
                    info!("Dry run download, url: {}", source);
                    info!("Dry run upload, url: {}", destination);
                    return Ok(());
                }
                self.fetch(source, &dest).await?;
                verify_md5_blocking(&dest, &job.checksum, &job.path).await?;
                self.transport.upload(destination, &dest).await
            }
        }
    }

    async fn fetch(&self, source: &Endpoint, dest: &Path) -> Result<u64> {
        debug!("Fetching {} into {}", source, dest.display());
        match source {
            Endpoint::Direct(url) => self.transport.download(url, dest).await,
            Endpoint::Proxied(url) => self.transport.download_by_proxy(url, dest).await,
        }
    }
}

fn job_source(job: &TransferJob) -> Result<&Endpoint> {
    if job.source.url().is_empty() {
        return Err(ReplayError::Remap {
            message: format!("no source URL computed for {}", job.path),
        });
    }
    Ok(&job.source)
}

fn upload_destination(job: &TransferJob) -> Result<&str> {
    match job.destination.as_deref() {
        Some(url) if !url.is_empty() => Ok(url),
        _ => Err(ReplayError::Remap {
            message: format!("no upload destination computed for {}", job.path),
        }),
    }
}

/// A cached file that fails verification would fail every re-run too.
fn discard_corrupt(cache: &Path, err: &ReplayError) {
    if matches!(err, ReplayError::ChecksumMismatch { .. }) {
        if let Err(e) = std::fs::remove_file(cache) {
            warn!("Could not drop corrupt cache file {}: {}", cache.display(), e);
        }
    }
}

fn report_failure(job: &TransferJob, err: &ReplayError) -> JobFailure {
    let kind = err.kind();
    error!(
        "[{}] {} failed: {} (source: {}, destination: {})",
        kind,
        job.path,
        err,
        job.source,
        job.destination.as_deref().unwrap_or("-")
    );
    JobFailure {
        path: job.path.clone(),
        kind,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{md5_hex, MockTransport};
    use tempfile::TempDir;

    fn dirs(tmp: &TempDir) -> StagingDirs {
        let dirs = StagingDirs {
            download_dir: tmp.path().join("download"),
            upload_dir: tmp.path().join("upload"),
        };
        std::fs::create_dir_all(&dirs.download_dir).unwrap();
        std::fs::create_dir_all(&dirs.upload_dir).unwrap();
        dirs
    }

    fn download(path: &str, content: &[u8]) -> TransferJob {
        TransferJob::download(
            path,
            "maven:remote:central",
            &md5_hex(content),
            Endpoint::Direct(format!("http://target/{path}")),
        )
    }

    fn upload(path: &str, content: &[u8]) -> TransferJob {
        TransferJob::relay(
            path,
            "maven:hosted:build-1",
            &md5_hex(content),
            Endpoint::Direct(format!("http://orig/{path}")),
            format!("http://target/{path}"),
        )
    }

    #[tokio::test]
    async fn test_sequential_fail_fast() {
        let tmp = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.serve("http://target/a", b"a");
        transport.serve("http://target/b", b"b");
        transport.serve("http://target/c", b"c");
        transport.fail_url("http://target/b");

        let jobs: JobSet = [download("a", b"a"), download("b", b"b"), download("c", b"c")]
            .into_iter()
            .collect();
        let executor = TransferExecutor::new(transport.clone(), dirs(&tmp), false);
        let outcome = executor.run_batch(&jobs, JobAction::Download, ExecutionMode::Sequential).await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.attempted, vec!["a", "b"]);
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.failures[0].kind, ErrorKind::Transport);
        assert!(!transport.fetched("http://target/c"));
    }

    #[tokio::test]
    async fn test_concurrent_aggregate_fails_on_any_job() {
        for failing in 0..4 {
            let tmp = TempDir::new().unwrap();
            let transport = Arc::new(MockTransport::new());
            let mut jobs = JobSet::new();
            for i in 0..4 {
                let path = format!("p{i}");
                transport.serve(&format!("http://target/{path}"), path.as_bytes());
                jobs.insert(download(&path, path.as_bytes()));
            }
            transport.fail_url(&format!("http://target/p{failing}"));

            let executor = TransferExecutor::new(transport.clone(), dirs(&tmp), false);
            let outcome = executor
                .run_batch(&jobs, JobAction::Download, ExecutionMode::Concurrent(3))
                .await;

            assert!(!outcome.is_success());
            assert_eq!(outcome.failures.len(), 1);
            assert_eq!(outcome.succeeded, 3);
            assert_eq!(outcome.attempted.len(), 4);
        }
    }

    #[tokio::test]
    async fn test_concurrent_all_succeed() {
        let tmp = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        let mut jobs = JobSet::new();
        for i in 0..10 {
            let path = format!("p{i}");
            transport.serve(&format!("http://target/{path}"), path.as_bytes());
            jobs.insert(download(&path, path.as_bytes()));
        }
        let executor = TransferExecutor::new(transport, dirs(&tmp), false);
        let outcome = executor
            .run_batch(&jobs, JobAction::Download, ExecutionMode::from_workers(4))
            .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.succeeded, 10);
        assert!(outcome.into_result("download").is_ok());
    }

    #[tokio::test]
    async fn test_checksum_gate_blocks_upload() {
        let tmp = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.serve("http://orig/x.jar", b"tampered");

        let jobs: JobSet = [upload("x.jar", b"original")].into_iter().collect();
        let executor = TransferExecutor::new(transport.clone(), dirs(&tmp), false);
        let outcome = executor
            .run_batch(&jobs, JobAction::CachedUpload, ExecutionMode::Sequential)
            .await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.failures[0].kind, ErrorKind::Integrity);
        assert!(transport.uploads().is_empty());
        // corrupt cache entries are dropped so a re-run fetches again
        let job = jobs.iter().next().unwrap();
        assert!(!executor.staging().upload_cache_path(job).exists());
    }

    #[tokio::test]
    async fn test_relay_checksum_gate_blocks_upload() {
        let tmp = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.serve("http://orig/x.jar", b"tampered");
        let jobs: JobSet = [upload("x.jar", b"original")].into_iter().collect();
        let executor = TransferExecutor::new(transport.clone(), dirs(&tmp), false);
        let outcome = executor.run_batch(&jobs, JobAction::Relay, ExecutionMode::Sequential).await;
        assert!(!outcome.is_success());
        assert!(transport.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_cache_reuse_skips_fetch() {
        let tmp = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        let job = upload("x.jar", b"payload");
        let staging = dirs(&tmp);
        std::fs::write(staging.upload_cache_path(&job), b"payload").unwrap();

        let jobs: JobSet = [job].into_iter().collect();
        let executor = TransferExecutor::new(transport.clone(), staging, false);
        let outcome = executor
            .run_batch(&jobs, JobAction::CachedUpload, ExecutionMode::Sequential)
            .await;

        assert!(outcome.is_success());
        assert!(!transport.fetched("http://orig/x.jar"));
        assert_eq!(transport.uploads(), vec!["http://target/x.jar".to_string()]);
    }

    #[tokio::test]
    async fn test_dry_run_is_pure_and_traces_like_a_real_run() {
        let jobs: JobSet = [upload("a.jar", b"a"), upload("b.jar", b"b")].into_iter().collect();

        let dry_tmp = TempDir::new().unwrap();
        let dry_transport = Arc::new(MockTransport::new());
        let dry = TransferExecutor::new(dry_transport.clone(), dirs(&dry_tmp), true)
            .run_batch(&jobs, JobAction::CachedUpload, ExecutionMode::Sequential)
            .await;

        assert!(dry.is_success());
        assert!(dry_transport.calls().is_empty());
        assert_eq!(std::fs::read_dir(dry_tmp.path().join("upload")).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(dry_tmp.path().join("download")).unwrap().count(), 0);

        let real_tmp = TempDir::new().unwrap();
        let real_transport = Arc::new(MockTransport::new());
        real_transport.serve("http://orig/a.jar", b"a");
        real_transport.serve("http://orig/b.jar", b"b");
        let real = TransferExecutor::new(real_transport, dirs(&real_tmp), false)
            .run_batch(&jobs, JobAction::CachedUpload, ExecutionMode::Sequential)
            .await;

        assert!(real.is_success());
        assert_eq!(dry.attempted, real.attempted);
    }

    #[tokio::test]
    async fn test_proxied_source_uses_proxy_transport() {
        let tmp = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.serve("https://repo.example.com/t.tgz", b"t");
        let job = TransferJob::download(
            "/t.tgz",
            "generic-http:remote:r-x",
            &md5_hex(b"t"),
            Endpoint::Proxied("https://repo.example.com/t.tgz".into()),
        );
        let jobs: JobSet = [job].into_iter().collect();
        let outcome = TransferExecutor::new(transport.clone(), dirs(&tmp), false)
            .run_batch(&jobs, JobAction::Download, ExecutionMode::Sequential)
            .await;
        assert!(outcome.is_success());
        assert_eq!(
            transport.calls(),
            vec!["PROXY https://repo.example.com/t.tgz".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_destination_fails_job() {
        let tmp = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        let mut job = upload("x.jar", b"x");
        job.destination = Some(String::new());
        let jobs: JobSet = [job].into_iter().collect();
        let outcome = TransferExecutor::new(transport.clone(), dirs(&tmp), false)
            .run_batch(&jobs, JobAction::Relay, ExecutionMode::Sequential)
            .await;
        assert_eq!(outcome.failures[0].kind, ErrorKind::Remapping);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_source_fails_in_dry_run_too() {
        let tmp = TempDir::new().unwrap();
        let job = TransferJob::download(
            "/t.tgz",
            "generic-http:remote:r-repo-build-1",
            &md5_hex(b"t"),
            Endpoint::Proxied(String::new()),
        );
        let jobs: JobSet = [job].into_iter().collect();

        for dry_run in [true, false] {
            let transport = Arc::new(MockTransport::new());
            let outcome = TransferExecutor::new(transport.clone(), dirs(&tmp), dry_run)
                .run_batch(&jobs, JobAction::Download, ExecutionMode::Sequential)
                .await;
            assert!(!outcome.is_success(), "dry_run={dry_run}");
            assert_eq!(outcome.failures[0].kind, ErrorKind::Remapping);
            assert!(transport.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn test_missing_checksum_fails_job() {
        let tmp = TempDir::new().unwrap();
        let transport = Arc::new(MockTransport::new());
        transport.serve("http://target/a", b"a");
        let mut job = download("a", b"a");
        job.checksum.clear();
        let jobs: JobSet = [job].into_iter().collect();
        let outcome = TransferExecutor::new(transport, dirs(&tmp), false)
            .run_batch(&jobs, JobAction::Download, ExecutionMode::Sequential)
            .await;
        assert_eq!(outcome.failures[0].kind, ErrorKind::Integrity);
    }

    #[test]
    fn test_mode_from_workers() {
        assert_eq!(ExecutionMode::from_workers(0), ExecutionMode::Sequential);
        assert_eq!(ExecutionMode::from_workers(1), ExecutionMode::Sequential);
        assert_eq!(ExecutionMode::from_workers(8), ExecutionMode::Concurrent(8));
    }
}
