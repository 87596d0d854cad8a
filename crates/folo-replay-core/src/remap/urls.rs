//! URL helpers shared by the remapping policies.

use crate::error::{ReplayError, Result};
use url::Url;

/// Normalize an Indy base URL: `http://` scheme when none is given, trailing slash.
pub fn normalize_base_url(indy_url: &str) -> String {
    let trimmed = indy_url.trim();
    let mut base = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

/// Check that `indy_url` names a reachable-looking host and return its
/// `host[:port]` authority.
pub fn validate_indy_url(indy_url: &str) -> Result<String> {
    if indy_url.trim().is_empty() {
        return Err(ReplayError::InvalidUrl {
            url: indy_url.to_string(),
            message: "empty Indy URL".to_string(),
        });
    }
    let parsed = Url::parse(&normalize_base_url(indy_url)).map_err(|e| ReplayError::InvalidUrl {
        url: indy_url.to_string(),
        message: e.to_string(),
    })?;
    let host = parsed.host_str().ok_or_else(|| ReplayError::InvalidUrl {
        url: indy_url.to_string(),
        message: "no host".to_string(),
    })?;
    Ok(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Join path pieces with single slashes, dropping empty segments.
fn join_segments(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|p| p.split('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// `base` must already be normalized.
pub fn build_url(base: &str, parts: &[&str]) -> String {
    format!("{}{}", base, join_segments(parts))
}

/// Swap the host (and port) of `addr` for `authority`, keeping the path.
///
/// Returns `None` when `addr` is not a valid absolute URL.
pub fn set_hostname(addr: &str, authority: &str) -> Option<String> {
    let mut url = Url::parse(addr).ok()?;
    let replacement = Url::parse(&format!("http://{authority}")).ok()?;
    url.set_host(replacement.host_str()).ok()?;
    url.set_port(replacement.port()).ok()?;
    Some(url.to_string())
}

/// Host of `origin_url` with dots turned into dashes, as used in generic-proxy
/// repository names.
pub fn repo_name_for_origin(origin_url: &str) -> Option<String> {
    let url = Url::parse(origin_url).ok()?;
    Some(url.host_str()?.replace('.', "-"))
}
