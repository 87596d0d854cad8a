//! Byte-moving primitives used by the transfer executor and the migration
//! orchestrator.
//!
//! Downloads are atomic: bytes stream into a temp file that is renamed into
//! place only once the body has been fully written.

use crate::config::NetworkConfig;
use crate::network::client::{HttpClient, ProxySettings};
use crate::{ReplayError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Result of a DELETE against Indy content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// Nothing was there; treated as success by callers.
    NotFound,
}

/// Blocking-in-spirit HTTP operations a transfer job is made of.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` into `dest`, returning the byte count.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;

    /// Fetch `url` through the generic HTTP proxy into `dest`.
    async fn download_by_proxy(&self, url: &str, dest: &Path) -> Result<u64>;

    /// Upload the file at `src` to `url`.
    async fn upload(&self, url: &str, src: &Path) -> Result<()>;

    /// Delete the resource at `url`.
    async fn delete(&self, url: &str) -> Result<DeleteOutcome>;
}

/// [`Transport`] over reqwest.
pub struct HttpTransport {
    http: HttpClient,
    proxied: Option<HttpClient>,
}

impl HttpTransport {
    /// Create a transport; `proxy` enables [`Transport::download_by_proxy`].
    pub fn new(proxy: Option<ProxySettings>) -> Result<Self> {
        let http = HttpClient::new()?;
        let proxied = proxy
            .map(|p| HttpClient::with_proxy(&p, NetworkConfig::REQUEST_TIMEOUT))
            .transpose()?;
        Ok(Self { http, proxied })
    }

    async fn fetch_to(&self, client: &HttpClient, url: &str, destination: &Path) -> Result<u64> {
        if url.is_empty() {
            return Err(ReplayError::Remap {
                message: format!("no source URL for {}", destination.display()),
            });
        }

        if let Some(parent) = destination.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ReplayError::io_with_path(e, parent))?;
            }
        }

        let temp_path = PathBuf::from(format!(
            "{}{}",
            destination.display(),
            NetworkConfig::DOWNLOAD_TEMP_SUFFIX
        ));

        match stream_to_file(client, url, &temp_path).await {
            Ok(bytes) => {
                std::fs::rename(&temp_path, destination).map_err(|e| {
                    let _ = std::fs::remove_file(&temp_path);
                    ReplayError::io_with_path(e, destination)
                })?;
                info!("Downloaded {} bytes from {} to {}", bytes, url, destination.display());
                Ok(bytes)
            }
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }
}

async fn stream_to_file(client: &HttpClient, url: &str, temp_path: &Path) -> Result<u64> {
    let response = client.get(url).await?;

    let mut file =
        std::fs::File::create(temp_path).map_err(|e| ReplayError::io_with_path(e, temp_path))?;
    let mut bytes_downloaded: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| ReplayError::Network {
            message: format!("Error reading download stream from {}", url),
            cause: Some(e.to_string()),
        })?;
        file.write_all(&chunk)
            .map_err(|e| ReplayError::io_with_path(e, temp_path))?;
        bytes_downloaded += chunk.len() as u64;
    }

    file.flush()
        .map_err(|e| ReplayError::io_with_path(e, temp_path))?;
    Ok(bytes_downloaded)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        self.fetch_to(&self.http, url, dest).await
    }

    async fn download_by_proxy(&self, url: &str, dest: &Path) -> Result<u64> {
        let proxied = self.proxied.as_ref().ok_or_else(|| ReplayError::Config {
            message: "generic proxy download requested but no proxy is configured".to_string(),
        })?;
        self.fetch_to(proxied, url, dest).await
    }

    async fn upload(&self, url: &str, src: &Path) -> Result<()> {
        if url.is_empty() {
            return Err(ReplayError::Remap {
                message: format!("no upload destination for {}", src.display()),
            });
        }
        let body = tokio::fs::read(src)
            .await
            .map_err(|e| ReplayError::io_with_path(e, src))?;
        let size = body.len();
        self.http.put_bytes(url, body).await?;
        info!("Uploaded {} bytes from {} to {}", size, src.display(), url);
        Ok(())
    }

    async fn delete(&self, url: &str) -> Result<DeleteOutcome> {
        if url.is_empty() {
            return Err(ReplayError::Remap {
                message: "no delete target".to_string(),
            });
        }
        let response = self.http.delete(url).await?;
        let status = response.status();
        if status.is_success() {
            Ok(DeleteOutcome::Deleted)
        } else if HttpClient::is_not_found(status) {
            debug!("Nothing to delete at {}", url);
            Ok(DeleteOutcome::NotFound)
        } else {
            Err(ReplayError::HttpStatus {
                method: "DELETE".to_string(),
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }
}
