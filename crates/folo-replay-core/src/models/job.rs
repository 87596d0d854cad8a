//! Transfer jobs derived from a tracked content report.

use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Where a job fetches its bytes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Plain GET against the URL.
    Direct(String),
    /// GET routed through the Indy generic HTTP proxy.
    Proxied(String),
}

impl Endpoint {
    pub fn url(&self) -> &str {
        match self {
            Endpoint::Direct(url) | Endpoint::Proxied(url) => url,
        }
    }

    pub fn is_proxied(&self) -> bool {
        matches!(self, Endpoint::Proxied(_))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Direct(url) => f.write_str(url),
            Endpoint::Proxied(url) => write!(f, "proxy:{url}"),
        }
    }
}

/// One unit of work: fetch `source`, verify `checksum`, optionally push to `destination`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    /// Artifact path, also the job's key within a [`JobSet`].
    pub path: String,
    /// Expected md5 in lowercase hex.
    pub checksum: String,
    pub source: Endpoint,
    /// Upload target; `None` for download-only jobs. An empty string marks a
    /// destination that could not be computed.
    pub destination: Option<String>,
    /// File name used inside the staging directories.
    pub staging_name: String,
}

impl TransferJob {
    /// Download-only job.
    pub fn download(path: &str, store_key: &str, checksum: &str, source: Endpoint) -> Self {
        Self {
            path: path.to_string(),
            checksum: checksum.to_string(),
            source,
            destination: None,
            staging_name: staging_name(store_key, path),
        }
    }

    /// Fetch-then-upload job.
    pub fn relay(
        path: &str,
        store_key: &str,
        checksum: &str,
        source: Endpoint,
        destination: String,
    ) -> Self {
        Self {
            path: path.to_string(),
            checksum: checksum.to_string(),
            source,
            destination: Some(destination),
            staging_name: staging_name(store_key, path),
        }
    }
}

/// Staging file name built from the full store path and artifact path, so two
/// artifacts sharing a base name never land on the same file.
pub fn staging_name(store_key: &str, path: &str) -> String {
    let store = store_key.replace([':', '/'], "_");
    let artifact = path.trim_matches('/').replace('/', "_");
    format!("{store}__{artifact}")
}

/// Jobs keyed by artifact path, iterated in insertion order.
///
/// Re-inserting a path replaces the earlier job in place (last write wins).
#[derive(Debug, Clone, Default)]
pub struct JobSet {
    jobs: Vec<TransferJob>,
    index: HashMap<String, usize>,
}

impl JobSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job, returning the one it replaced.
    pub fn insert(&mut self, job: TransferJob) -> Option<TransferJob> {
        if let Some(&pos) = self.index.get(&job.path) {
            warn!("Duplicate path {} in report, keeping the later entry", job.path);
            return Some(std::mem::replace(&mut self.jobs[pos], job));
        }
        self.index.insert(job.path.clone(), self.jobs.len());
        self.jobs.push(job);
        None
    }

    pub fn get(&self, path: &str) -> Option<&TransferJob> {
        self.index.get(path).map(|&pos| &self.jobs[pos])
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TransferJob> {
        self.jobs.iter()
    }
}

impl FromIterator<TransferJob> for JobSet {
    fn from_iter<I: IntoIterator<Item = TransferJob>>(iter: I) -> Self {
        let mut set = JobSet::new();
        for job in iter {
            set.insert(job);
        }
        set
    }
}

impl IntoIterator for JobSet {
    type Item = TransferJob;
    type IntoIter = std::vec::IntoIter<TransferJob>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.into_iter()
    }
}

impl<'a> IntoIterator for &'a JobSet {
    type Item = &'a TransferJob;
    type IntoIter = std::slice::Iter<'a, TransferJob>;

    fn into_iter(self) -> Self::IntoIter {
        self.jobs.iter()
    }
}
