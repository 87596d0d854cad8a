//! Build-number substitution in uploaded artifact paths.
//!
//! Uploads carry the original build's number inside their version string
//! (`1.0.0.redhat-00001`). Replaying them into a new build rewrites that part to
//! the new build number so the target hosted repo holds fresh coordinates.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

static REDHAT_BUILD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>.+[.-]redhat-)(?P<build>\d+)$").expect("redhat build regex must compile")
});

/// Rewrite the build-number-bearing segment of `path` to `new_suffix`.
///
/// Maven paths take the version from the parent directory of the file (and
/// rewrite it wherever it also appears in the file name). npm paths take it from
/// the tarball name after `/-/`. Paths without a recognizable version are
/// returned unchanged.
pub fn alter_upload_path(path: &str, store_key: &str, new_suffix: &str) -> String {
    let altered = if store_key.starts_with("npm:") {
        alter_npm_path(path, new_suffix)
    } else {
        alter_maven_path(path, new_suffix)
    };

    match altered {
        Some(altered) => altered,
        None => {
            warn!("No build-number segment found in {}, path left unchanged", path);
            path.to_string()
        }
    }
}

/// Replace the build part of a version string.
///
/// `1.0.0.redhat-00001` -> `1.0.0.redhat-<suffix>`, otherwise everything after the
/// first `-` is replaced: `1.0-buildId-old` -> `1.0-<suffix>`.
fn rewrite_version(version: &str, new_suffix: &str) -> Option<String> {
    if let Some(caps) = REDHAT_BUILD.captures(version) {
        return Some(format!("{}{}", &caps["base"], new_suffix));
    }
    let (base, build) = version.split_once('-')?;
    if base.is_empty() || build.is_empty() {
        return None;
    }
    Some(format!("{base}-{new_suffix}"))
}

fn alter_maven_path(path: &str, new_suffix: &str) -> Option<String> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 2 {
        return None;
    }
    let file_idx = segments.len() - 1;
    let version = segments[file_idx - 1];
    // artifactId directories (maven-metadata.xml level) never start with a digit
    if !version.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let new_version = rewrite_version(version, new_suffix)?;

    let mut out: Vec<String> = segments.iter().map(|s| s.to_string()).collect();
    out[file_idx - 1] = new_version.clone();
    out[file_idx] = segments[file_idx].replace(version, &new_version);
    Some(out.join("/"))
}

fn alter_npm_path(path: &str, new_suffix: &str) -> Option<String> {
    let (package, tarball) = path.rsplit_once("/-/")?;
    let name = package.rsplit('/').next()?;
    let version = tarball
        .strip_prefix(name)?
        .strip_prefix('-')?
        .strip_suffix(".tgz")?;
    let new_version = rewrite_version(version, new_suffix)?;
    Some(format!("{package}/-/{name}-{new_version}.tgz"))
}
