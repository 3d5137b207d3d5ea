//! Blob storage for uploaded images.
//!
//! Keys are namespaced by feature (`blog/`, `partners/`, `portfolio/`) and
//! exposed to clients as `{PUBLIC_BASE_URL}/files/{key}`.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tokio::{io::AsyncWriteExt, sync::RwLock};

use super::StoreError;

const WRITE_CHUNK: usize = 64 * 1024;
const FILES_PREFIX: &str = "/files/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        self.bytes_transferred as f64 / self.total_bytes as f64 * 100.0
    }
}

/// Invoked as bytes are written.
pub type ProgressCallback<'a> = &'a (dyn Fn(UploadProgress) + Send + Sync);

#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub bytes: Bytes,
    pub content_type: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Blob>, StoreError>;

    /// Returns `false` when nothing was stored under `key`.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<Duration, StoreError>;
}

// ============================================================================
// Keys, URLs and content sniffing
// ============================================================================

/// Reject traversal and absolute keys.
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains("..")
        || key.contains('\\')
        || key.contains('\0')
        || key.split('/').any(str::is_empty);
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Reduce an uploaded filename to `[A-Za-z0-9._-]`.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').replace("..", "_");
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// `{namespace}/{unix_millis}_{filename}`
pub fn blob_key(namespace: &str, filename: &str, unix_millis: i64) -> String {
    format!("{}/{}_{}", namespace, unix_millis, sanitize_filename(filename))
}

pub fn blob_url(public_base_url: &str, key: &str) -> String {
    format!("{}{}{}", public_base_url, FILES_PREFIX, key)
}

/// Recover the storage key from a URL produced by [`blob_url`].
pub fn key_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once(FILES_PREFIX)?;
    let key = rest.split(['?', '#']).next().unwrap_or_default();
    validate_key(key).ok()?;
    Some(key.to_string())
}

/// Identify an image by its magic bytes.
pub fn sniff_image_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 4 {
        return None;
    }
    match bytes {
        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        // GIF: 47 49 46 38
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        // WebP: RIFF....WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

// ============================================================================
// Local directory
// ============================================================================

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |p, seg| p.join(seg)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        _content_type: &str,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let total = bytes.len() as u64;
        let mut file = tokio::fs::File::create(&path).await?;
        let mut written = 0u64;
        for chunk in bytes.chunks(WRITE_CHUNK) {
            file.write_all(chunk).await?;
            written += chunk.len() as u64;
            if let Some(report) = progress {
                report(UploadProgress {
                    bytes_transferred: written,
                    total_bytes: total,
                });
            }
        }
        file.flush().await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Blob>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => {
                let content_type = sniff_image_type(&data)
                    .unwrap_or("application/octet-stream")
                    .to_string();
                Ok(Some(Blob {
                    bytes: Bytes::from(data),
                    content_type,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::metadata(&self.root).await?;
        Ok(start.elapsed())
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Blob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<(), StoreError> {
        validate_key(key)?;
        let total = bytes.len() as u64;
        self.blobs.write().await.insert(
            key.to_string(),
            Blob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        if let Some(report) = progress {
            report(UploadProgress {
                bytes_transferred: total,
                total_bytes: total,
            });
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Blob>, StoreError> {
        validate_key(key)?;
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        Ok(self.blobs.write().await.remove(key).is_some())
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        Ok(Duration::ZERO)
    }
}
