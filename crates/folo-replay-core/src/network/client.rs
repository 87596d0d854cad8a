//! HTTP client for talking to Indy.
//!
//! Thin wrapper around reqwest with:
//! - Configurable timeouts and user agent
//! - Optional proxy with basic auth (Indy's generic HTTP proxy)
//! - Status checking that maps failures to [`ReplayError::HttpStatus`]

use crate::config::NetworkConfig;
use crate::{ReplayError, Result};
use reqwest::{Client, Proxy, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Credentials for Indy's generic HTTP proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub url: String,
    pub user: String,
    pub password: String,
}

/// HTTP client used by the transport and the Indy service.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    /// Timeout applied to every request; reported in [`ReplayError::Timeout`].
    default_timeout: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_timeout(NetworkConfig::REQUEST_TIMEOUT)
    }

    /// Create a new HTTP client with a custom default timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| ReplayError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    /// Create a client that sends every request through `proxy`.
    pub fn with_proxy(proxy: &ProxySettings, timeout: Duration) -> Result<Self> {
        let proxy_cfg = Proxy::all(&proxy.url)
            .map_err(|e| ReplayError::InvalidUrl {
                url: proxy.url.clone(),
                message: e.to_string(),
            })?
            .basic_auth(&proxy.user, &proxy.password);

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .proxy(proxy_cfg)
            .build()
            .map_err(|e| ReplayError::Network {
                message: format!("Failed to create proxied HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    /// GET; non-success statuses are errors.
    pub async fn get(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.network_error("GET", url, e))?;
        check_status("GET", url, response)
    }

    /// PUT a byte body; non-success statuses are errors.
    pub async fn put_bytes(&self, url: &str, body: Vec<u8>) -> Result<Response> {
        let response = self
            .client
            .put(url)
            .body(body)
            .send()
            .await
            .map_err(|e| self.network_error("PUT", url, e))?;
        check_status("PUT", url, response)
    }

    /// POST a JSON body; non-success statuses are errors.
    pub async fn post_json<T: serde::Serialize>(&self, url: &str, body: &T) -> Result<Response> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.network_error("POST", url, e))?;
        check_status("POST", url, response)
    }

    /// POST without a body; non-success statuses are errors.
    pub async fn post_empty(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| self.network_error("POST", url, e))?;
        check_status("POST", url, response)
    }

    /// DELETE; the raw response is returned so callers can treat 404 as they like.
    pub async fn delete(&self, url: &str) -> Result<Response> {
        self.client
            .delete(url)
            .send()
            .await
            .map_err(|e| self.network_error("DELETE", url, e))
    }

    /// GET and decode a JSON body.
    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get(url).await?;
        let body = response.text().await.map_err(|e| self.network_error("GET", url, e))?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Check if an HTTP status code indicates the resource is simply absent.
    pub fn is_not_found(status: StatusCode) -> bool {
        status == StatusCode::NOT_FOUND
    }

    fn network_error(&self, method: &str, url: &str, err: reqwest::Error) -> ReplayError {
        if err.is_timeout() {
            return ReplayError::Timeout {
                url: url.to_string(),
                after: self.default_timeout,
            };
        }
        ReplayError::Network {
            message: format!("{} {} failed", method, url),
            cause: Some(err.to_string()),
        }
    }
}

fn check_status(method: &str, url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    debug!("{} {} -> {}", method, url, status);
    if status.is_success() {
        Ok(response)
    } else {
        Err(ReplayError::HttpStatus {
            method: method.to_string(),
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}
