use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::error::ApiError;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File exceeds maximum upload size of {0} bytes")]
    TooLarge(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::TooLarge(_) => ApiError::bad_request(err.to_string()),
            StorageError::Io(io) => {
                tracing::error!("Upload storage error: {}", io);
                ApiError::internal_server_error("Failed to store uploaded file")
            }
        }
    }
}

/// Result of persisting an upload under the configured upload directory.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Path relative to the upload directory, e.g. `documents/7f2c….pdf`
    pub path: String,
    pub size_bytes: i64,
    /// sha256 of the stored bytes, hex-encoded
    pub checksum: String,
}

/// Persist uploaded bytes under `<upload_dir>/<subdir>/<uuid>.<ext>`.
///
/// The stored name is always a fresh UUID; only a sanitized extension is
/// taken from the client-supplied file name.
pub async fn store(
    subdir: &str,
    original_name: &str,
    bytes: &[u8],
) -> Result<StoredFile, StorageError> {
    let storage = &config::config().storage;
    if bytes.len() > storage.max_upload_bytes {
        return Err(StorageError::TooLarge(storage.max_upload_bytes));
    }

    let filename = match sanitized_extension(original_name) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    };

    let dir = PathBuf::from(&storage.upload_dir).join(subdir);
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(dir.join(&filename), bytes).await?;

    Ok(StoredFile {
        path: format!("{}/{}", subdir, filename),
        size_bytes: bytes.len() as i64,
        checksum: sha256_hex(bytes),
    })
}

/// Absolute filesystem path for a stored relative path.
pub fn absolute_path(relative: &str) -> PathBuf {
    PathBuf::from(&config::config().storage.upload_dir).join(relative)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn sanitized_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 10 {
        return None;
    }
    if ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext.to_ascii_lowercase())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_sanitized() {
        assert_eq!(sanitized_extension("report.PDF"), Some("pdf".to_string()));
        assert_eq!(sanitized_extension("logo.png"), Some("png".to_string()));
        assert_eq!(sanitized_extension("no-extension"), None);
        assert_eq!(sanitized_extension("weird.p!g"), None);
        assert_eq!(sanitized_extension("evil.path/../../x"), None);
    }

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
