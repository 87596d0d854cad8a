//! Streaming md5 computation for staged artifacts.
//!
//! Folo records only an md5 per access, so that is the integrity contract
//! between the report and the replay.

use crate::error::{ReplayError, Result};
use md5::{Digest, Md5};
use std::io::Read;
use std::path::Path;

/// Chunk size for reading files.
const CHUNK_SIZE: usize = 1024 * 1024;

/// Compute the md5 of a file as lowercase hex.
pub fn compute_md5(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| ReplayError::io_with_path(e, path))?;

    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| ReplayError::io_with_path(e, path))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify a staged file against the md5 recorded for `artifact`.
///
/// An empty expected checksum is a failure, never a pass.
pub fn verify_md5(path: impl AsRef<Path>, expected: &str, artifact: &str) -> Result<()> {
    let expected_lower = expected.trim().to_lowercase();
    if expected_lower.is_empty() {
        return Err(ReplayError::MissingChecksum {
            path: artifact.to_string(),
        });
    }

    let actual = compute_md5(path)?;
    if actual == expected_lower {
        Ok(())
    } else {
        Err(ReplayError::ChecksumMismatch {
            path: artifact.to_string(),
            expected: expected_lower,
            actual,
        })
    }
}

/// Hash on a blocking thread so workers do not stall the runtime.
pub async fn verify_md5_blocking(
    path: impl AsRef<Path>,
    expected: &str,
    artifact: &str,
) -> Result<()> {
    let path = path.as_ref().to_path_buf();
    let expected = expected.to_string();
    let artifact = artifact.to_string();
    tokio::task::spawn_blocking(move || verify_md5(&path, &expected, &artifact))
        .await
        .map_err(|e| ReplayError::Other(format!("Hash computation task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_md5_empty_file() {
        let file = NamedTempFile::new().unwrap();
        assert_eq!(
            compute_md5(file.path()).unwrap(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn test_verify_md5_match_is_case_insensitive() {
        let file = file_with(b"a");
        assert!(verify_md5(file.path(), "0CC175B9C0F1B6A831C399E269772661", "a.txt").is_ok());
    }

    #[test]
    fn test_verify_md5_mismatch() {
        let file = file_with(b"a");
        let err = verify_md5(file.path(), "d41d8cd98f00b204e9800998ecf8427e", "a.txt").unwrap_err();
        assert!(matches!(err, ReplayError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_verify_md5_missing_checksum() {
        let file = file_with(b"a");
        let err = verify_md5(file.path(), "", "a.txt").unwrap_err();
        assert!(matches!(err, ReplayError::MissingChecksum { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = compute_md5("/nonexistent/folo-replay/file").unwrap_err();
        assert!(matches!(err, ReplayError::Io { .. }));
    }

    #[tokio::test]
    async fn test_verify_md5_blocking() {
        let file = file_with(b"a");
        verify_md5_blocking(file.path(), "0cc175b9c0f1b6a831c399e269772661", "a.txt")
            .await
            .unwrap();
    }
}
