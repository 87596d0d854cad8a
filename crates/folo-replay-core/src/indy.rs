//! Indy service calls outside the transfer path: folo record access, build
//! repository provisioning, store deletion.

use crate::config::IndyConfig;
use crate::models::{StoreKey, StoreType, TrackedContent};
use crate::network::HttpClient;
use crate::remap::{build_url, normalize_base_url, repo_name_for_origin};
use crate::{ReplayError, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Per-ecosystem defaults for the build group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMeta {
    pub package_type: String,
    /// Stores every build group aggregates besides the build's own hosted repo.
    pub constituents: Vec<String>,
}

impl BuildMeta {
    pub fn for_package_type(package_type: &str) -> Self {
        let constituents: &[&str] = match package_type {
            "maven" => &[
                "maven:hosted:shared-imports",
                "maven:hosted:pnc-builds",
                "maven:remote:central",
            ],
            "npm" => &["npm:hosted:shared-imports", "npm:remote:npmjs"],
            _ => &[],
        };
        Self {
            package_type: package_type.to_string(),
            constituents: constituents.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Random `build-NNNNNN` name for a replay that was not given one.
pub fn generate_build_name() -> String {
    let number: u32 = rand::rng().random_range(100_000..1_000_000);
    format!("{}{}", IndyConfig::BUILD_NAME_PREFIX, number)
}

/// Store keys Indy creates per origin host when the generic proxy is used.
pub fn generic_proxy_store_keys(report: &TrackedContent, build_id: &str) -> Vec<String> {
    let mut keys = Vec::new();
    for down in report.downloads.iter().filter(|d| d.is_generic_proxy()) {
        let Some(host) = down.origin_url.as_deref().and_then(repo_name_for_origin) else {
            warn!("Cannot derive proxy repo name for {}", down.path);
            continue;
        };
        for (store_type, prefix) in [
            (StoreType::Hosted, "h"),
            (StoreType::Remote, "r"),
            (StoreType::Group, "g"),
        ] {
            let key = StoreKey::new(
                IndyConfig::GENERIC_HTTP,
                store_type,
                format!("{prefix}-{host}-{build_id}"),
            )
            .to_string();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

/// Indy calls the run coordinator depends on.
#[async_trait]
pub trait IndyService: Send + Sync {
    /// Read the tracked content report of `build_id`.
    async fn get_folo_record(&self, base_url: &str, build_id: &str) -> Result<TrackedContent>;

    /// Seal the tracking record of `build_id`; `false` when Indy refused.
    async fn seal_folo_record(&self, base_url: &str, build_id: &str) -> Result<bool>;

    /// Create the hosted repo and group a replayed build writes into and reads through.
    async fn prepare_repos(
        &self,
        base_url: &str,
        build_id: &str,
        meta: &BuildMeta,
        additional_repos: &[String],
        dry_run: bool,
    ) -> Result<bool>;

    /// Remove a store definition.
    async fn delete_store(&self, base_url: &str, store_key: &str, dry_run: bool) -> Result<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreDefinition {
    key: String,
    #[serde(rename = "type")]
    store_type: &'static str,
    name: String,
    package_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    constituents: Option<Vec<String>>,
    #[serde(rename = "allow_releases", skip_serializing_if = "Option::is_none")]
    allow_releases: Option<bool>,
    #[serde(rename = "allow_snapshots", skip_serializing_if = "Option::is_none")]
    allow_snapshots: Option<bool>,
    description: String,
}

/// [`IndyService`] over Indy's REST API.
pub struct HttpIndyService {
    http: HttpClient,
}

impl HttpIndyService {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: HttpClient::new()?,
        })
    }

    fn record_url(base_url: &str, build_id: &str) -> String {
        build_url(
            &normalize_base_url(base_url),
            &["api/folo/admin", build_id, "record"],
        )
    }

    async fn create_store(&self, base_url: &str, def: &StoreDefinition, dry_run: bool) -> Result<()> {
        let url = build_url(
            &normalize_base_url(base_url),
            &["api/admin/stores", &def.package_type, def.store_type],
        );
        if dry_run {
            info!(
                "Dry run create {} at {}: {}",
                def.key,
                url,
                serde_json::to_string(def)?
            );
            return Ok(());
        }
        self.http.post_json(&url, def).await?;
        info!("Created store {}", def.key);
        Ok(())
    }
}

#[async_trait]
impl IndyService for HttpIndyService {
    async fn get_folo_record(&self, base_url: &str, build_id: &str) -> Result<TrackedContent> {
        let url = Self::record_url(base_url, build_id);
        debug!("Fetching folo record from {}", url);
        self.http.get_json(&url).await
    }

    async fn seal_folo_record(&self, base_url: &str, build_id: &str) -> Result<bool> {
        let url = Self::record_url(base_url, build_id);
        match self.http.post_empty(&url).await {
            Ok(_) => Ok(true),
            Err(ReplayError::HttpStatus { status, .. }) => {
                warn!("Sealing {} returned status {}", build_id, status);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn prepare_repos(
        &self,
        base_url: &str,
        build_id: &str,
        meta: &BuildMeta,
        additional_repos: &[String],
        dry_run: bool,
    ) -> Result<bool> {
        let hosted = StoreKey::new(&meta.package_type, StoreType::Hosted, build_id);
        let hosted_def = StoreDefinition {
            key: hosted.to_string(),
            store_type: StoreType::Hosted.as_str(),
            name: build_id.to_string(),
            package_type: meta.package_type.clone(),
            constituents: None,
            allow_releases: Some(true),
            allow_snapshots: Some(true),
            description: format!("Hosted repository for replayed build {build_id}"),
        };

        let mut constituents = vec![hosted.to_string()];
        for key in meta.constituents.iter().chain(additional_repos) {
            if !constituents.contains(key) {
                constituents.push(key.clone());
            }
        }
        let group_def = StoreDefinition {
            key: StoreKey::new(&meta.package_type, StoreType::Group, build_id).to_string(),
            store_type: StoreType::Group.as_str(),
            name: build_id.to_string(),
            package_type: meta.package_type.clone(),
            constituents: Some(constituents),
            allow_releases: None,
            allow_snapshots: None,
            description: format!("Group for replayed build {build_id}"),
        };

        for def in [&hosted_def, &group_def] {
            if let Err(e) = self.create_store(base_url, def, dry_run).await {
                warn!("Failed to create {}: {}", def.key, e);
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn delete_store(&self, base_url: &str, store_key: &str, dry_run: bool) -> Result<()> {
        let key: StoreKey = store_key.parse()?;
        let url = build_url(
            &normalize_base_url(base_url),
            &["api/admin/stores", &key.package_type, key.store_type.as_str(), &key.name],
        );
        if dry_run {
            info!("Dry run delete store {}", url);
            return Ok(());
        }
        let response = self.http.delete(&url).await?;
        let status = response.status();
        if status.is_success() || HttpClient::is_not_found(status) {
            info!("Deleted store {}", store_key);
            Ok(())
        } else {
            Err(ReplayError::HttpStatus {
                method: "DELETE".to_string(),
                url,
                status: status.as_u16(),
            })
        }
    }
}
