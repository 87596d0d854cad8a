//! Tracked content report types.

use crate::error::{ReplayError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of the tracked session a report belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingKey {
    pub id: String,
}

/// How an artifact was fetched during the original build.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessChannel {
    /// Arbitrary external URL fetched through Indy's generic HTTP proxy.
    GenericProxy,
    #[default]
    Native,
    #[serde(other)]
    Other,
}

/// One recorded access.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrackedContentEntry {
    pub store_key: String,
    pub path: String,
    #[serde(default)]
    pub md5: String,
    #[serde(default)]
    pub origin_url: Option<String>,
    #[serde(default)]
    pub local_url: Option<String>,
    #[serde(default)]
    pub access_channel: AccessChannel,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

impl TrackedContentEntry {
    pub fn is_generic_proxy(&self) -> bool {
        self.access_channel == AccessChannel::GenericProxy
    }

    /// Store key with `:` separators turned into path separators.
    pub fn store_path(&self) -> String {
        store_key_to_path(&self.store_key)
    }
}

/// Everything one build downloaded and uploaded, as recorded by folo.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrackedContent {
    pub tracking_key: TrackingKey,
    #[serde(default)]
    pub downloads: Vec<TrackedContentEntry>,
    #[serde(default)]
    pub uploads: Vec<TrackedContentEntry>,
}

impl TrackedContent {
    /// Parse a report from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a report saved to disk.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let json =
            std::fs::read_to_string(path).map_err(|e| ReplayError::io_with_path(e, path))?;
        Self::from_json(&json)
    }

    pub fn tracking_id(&self) -> &str {
        &self.tracking_key.id
    }
}

/// Parsed `packageType:type:name` store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    pub package_type: String,
    pub store_type: StoreType,
    pub name: String,
}

/// Indy repository kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreType {
    Hosted,
    Remote,
    Group,
}

impl StoreType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreType::Hosted => "hosted",
            StoreType::Remote => "remote",
            StoreType::Group => "group",
        }
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StoreKey {
    pub fn new(package_type: impl Into<String>, store_type: StoreType, name: impl Into<String>) -> Self {
        Self {
            package_type: package_type.into(),
            store_type,
            name: name.into(),
        }
    }

    /// `maven/hosted/build-1234`
    pub fn to_path(&self) -> String {
        format!("{}/{}/{}", self.package_type, self.store_type, self.name)
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.package_type, self.store_type, self.name)
    }
}

impl FromStr for StoreKey {
    type Err = ReplayError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        let (Some(package_type), Some(store_type), Some(name)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(ReplayError::Remap {
                message: format!("store key {s:?} is not packageType:type:name"),
            });
        };
        let store_type = match store_type {
            "hosted" => StoreType::Hosted,
            "remote" => StoreType::Remote,
            "group" => StoreType::Group,
            other => {
                return Err(ReplayError::Remap {
                    message: format!("unknown store type {other:?} in {s:?}"),
                })
            }
        };
        if package_type.is_empty() || name.is_empty() {
            return Err(ReplayError::Remap {
                message: format!("store key {s:?} has empty components"),
            });
        }
        Ok(StoreKey::new(package_type, store_type, name))
    }
}

/// Textual `:` to `/` conversion, tolerant of malformed keys.
pub fn store_key_to_path(store_key: &str) -> String {
    store_key.replace(':', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "trackingKey": { "id": "build-1234" },
        "uploads": [
            {
                "storeKey": "maven:hosted:build-1234",
                "accessChannel": "NATIVE",
                "path": "/org/x/1.0.redhat-00001/x-1.0.redhat-00001.jar",
                "md5": "0cc175b9c0f1b6a831c399e269772661",
                "size": 1
            }
        ],
        "downloads": [
            {
                "storeKey": "generic-http:remote:r-repo-example-com-build-1234",
                "accessChannel": "GENERIC_PROXY",
                "path": "/pub/tool.tar.gz",
                "originUrl": "http://repo.example.com/pub/tool.tar.gz",
                "localUrl": "http://indy.example.com/api/content/generic-http/remote/r-repo-example-com-build-1234/pub/tool.tar.gz",
                "md5": "92eb5ffee6ae2fec3ad71c777531578f"
            },
            {
                "storeKey": "maven:remote:central",
                "accessChannel": "MAVEN_REPO",
                "path": "/junit/junit/4.13/junit-4.13.pom",
                "md5": "4a8a8b0c4ef5c1fbb83edbd4c24b9d5a"
            }
        ]
    }"#;

    #[test]
    fn test_parse_folo_report() {
        let report = TrackedContent::from_json(REPORT).unwrap();
        assert_eq!(report.tracking_id(), "build-1234");
        assert_eq!(report.uploads.len(), 1);
        assert_eq!(report.downloads.len(), 2);
        assert!(report.downloads[0].is_generic_proxy());
        assert_eq!(report.downloads[1].access_channel, AccessChannel::Other);
        assert_eq!(report.downloads[1].origin_url, None);
        assert_eq!(report.uploads[0].access_channel, AccessChannel::Native);
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let report = TrackedContent::from_json(r#"{"trackingKey":{"id":"b"}}"#).unwrap();
        assert!(report.downloads.is_empty());
        assert!(report.uploads.is_empty());
    }

    #[test]
    fn test_store_key_parse() {
        let key: StoreKey = "maven:hosted:build-1234".parse().unwrap();
        assert_eq!(key.package_type, "maven");
        assert_eq!(key.store_type, StoreType::Hosted);
        assert_eq!(key.name, "build-1234");
        assert_eq!(key.to_path(), "maven/hosted/build-1234");
        assert_eq!(key.to_string(), "maven:hosted:build-1234");

        assert!("maven:hosted".parse::<StoreKey>().is_err());
        assert!("maven:weird:x".parse::<StoreKey>().is_err());
    }

    #[test]
    fn test_store_key_to_path_is_textual() {
        assert_eq!(store_key_to_path("npm:remote:npmjs"), "npm/remote/npmjs");
        assert_eq!(store_key_to_path("broken"), "broken");
    }
}
