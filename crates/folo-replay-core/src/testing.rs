//! In-memory doubles for the network seams, shared by unit tests.

use crate::indy::{BuildMeta, IndyService};
use crate::models::TrackedContent;
use crate::network::{DeleteOutcome, Transport};
use crate::{ReplayError, Result};
use async_trait::async_trait;
use md5::{Digest, Md5};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

pub fn md5_hex(content: &[u8]) -> String {
    hex::encode(Md5::digest(content))
}

/// Transport that serves canned bytes and records every call.
#[derive(Default)]
pub struct MockTransport {
    content: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    uploaded: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `url` return `bytes` on GET; it also counts as existing for DELETE.
    pub fn serve(&self, url: &str, bytes: &[u8]) {
        self.content
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes.to_vec());
    }

    /// Every request to `url` fails with a transport error.
    pub fn fail_url(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetched(&self, url: &str) -> bool {
        self.calls()
            .iter()
            .any(|c| c == &format!("GET {url}") || c == &format!("PROXY {url}"))
    }

    pub fn uploads(&self) -> Vec<String> {
        self.with_prefix("PUT ")
    }

    pub fn deletes(&self) -> Vec<String> {
        self.with_prefix("DELETE ")
    }

    pub fn uploaded_content(&self, url: &str) -> Option<Vec<u8>> {
        self.uploaded.lock().unwrap().get(url).cloned()
    }

    fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failing(&self, method: &str, url: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(url) {
            return Err(ReplayError::Network {
                message: format!("{method} {url} failed"),
                cause: Some("connection refused".to_string()),
            });
        }
        Ok(())
    }

    fn write(&self, method: &str, url: &str, dest: &Path) -> Result<u64> {
        self.record(format!("{method} {url}"));
        self.check_failing(method, url)?;
        let bytes = self.content.lock().unwrap().get(url).cloned().ok_or_else(|| {
            ReplayError::HttpStatus {
                method: "GET".to_string(),
                url: url.to_string(),
                status: 404,
            }
        })?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, &bytes).map_err(|e| ReplayError::io_with_path(e, dest))?;
        Ok(bytes.len() as u64)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.write("GET", url, dest)
    }

    async fn download_by_proxy(&self, url: &str, dest: &Path) -> Result<u64> {
        self.write("PROXY", url, dest)
    }

    async fn upload(&self, url: &str, src: &Path) -> Result<()> {
        self.record(format!("PUT {url}"));
        self.check_failing("PUT", url)?;
        let bytes = std::fs::read(src).map_err(|e| ReplayError::io_with_path(e, src))?;
        self.uploaded.lock().unwrap().insert(url.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, url: &str) -> Result<DeleteOutcome> {
        self.record(format!("DELETE {url}"));
        if url.is_empty() {
            return Err(ReplayError::Remap {
                message: "no delete target".to_string(),
            });
        }
        if self.failing.lock().unwrap().contains(url) {
            return Err(ReplayError::HttpStatus {
                method: "DELETE".to_string(),
                url: url.to_string(),
                status: 500,
            });
        }
        match self.content.lock().unwrap().remove(url) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::NotFound),
        }
    }
}

/// Indy service double that records provisioning, cleanup and seal calls.
#[derive(Default)]
pub struct MockIndyService {
    pub report: Mutex<Option<TrackedContent>>,
    pub seal_succeeds: Mutex<bool>,
    pub provision_succeeds: Mutex<bool>,
    calls: Mutex<Vec<String>>,
}

impl MockIndyService {
    pub fn new() -> Self {
        Self {
            seal_succeeds: Mutex::new(true),
            provision_succeeds: Mutex::new(true),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl IndyService for MockIndyService {
    async fn get_folo_record(&self, base_url: &str, build_id: &str) -> Result<TrackedContent> {
        self.record(format!("record {base_url} {build_id}"));
        self.report
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ReplayError::Other(format!("no record for {build_id}")))
    }

    async fn seal_folo_record(&self, base_url: &str, build_id: &str) -> Result<bool> {
        self.record(format!("seal {base_url} {build_id}"));
        Ok(*self.seal_succeeds.lock().unwrap())
    }

    async fn prepare_repos(
        &self,
        base_url: &str,
        build_id: &str,
        meta: &BuildMeta,
        additional_repos: &[String],
        dry_run: bool,
    ) -> Result<bool> {
        self.record(format!(
            "prepare {base_url} {build_id} {} +{} dry_run={dry_run}",
            meta.package_type,
            additional_repos.len()
        ));
        Ok(*self.provision_succeeds.lock().unwrap())
    }

    async fn delete_store(&self, base_url: &str, store_key: &str, dry_run: bool) -> Result<()> {
        self.record(format!("delete-store {base_url} {store_key} dry_run={dry_run}"));
        Ok(())
    }
}
