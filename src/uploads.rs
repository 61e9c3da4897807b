//! Completed chunked uploads on disk.
//!
//! Each upload key names an entry directly under the upload root: either the
//! assembled file itself or a directory holding it.

use crate::config::SchemaConfig;
use crate::core::{Result, SchemaError};
use crate::media::sniff_mime;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::AsyncReadExt;

const SNIFF_LEN: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedUpload {
    pub key: String,
    pub path: PathBuf,
    pub mime_type: String,
    pub size: u64,
}

#[async_trait]
pub trait UploadStore: Send + Sync {
    async fn resolve(&self, key: &str) -> Result<ResolvedUpload>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub kept: usize,
    pub bytes_freed: u64,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct DiskUploadStore {
    root: PathBuf,
    max_size: u64,
}

impl DiskUploadStore {
    pub fn new(root: impl Into<PathBuf>, max_size: u64) -> Self {
        Self {
            root: root.into(),
            max_size,
        }
    }

    pub fn from_config(config: &SchemaConfig) -> Self {
        Self::new(config.upload_dir.clone(), config.upload_max_size)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove uploads last modified more than `max_age` ago.
    ///
    /// With `dry_run` nothing is deleted; the report lists what would be.
    pub async fn clean_stale(&self, max_age: Duration, dry_run: bool) -> Result<CleanupReport> {
        let mut report = CleanupReport {
            dry_run,
            ..CleanupReport::default()
        };

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(err) => return Err(err.into()),
        };

        let now = SystemTime::now();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            let age = now
                .duration_since(metadata.modified()?)
                .unwrap_or(Duration::ZERO);
            if age <= max_age {
                report.kept += 1;
                continue;
            }

            let path = entry.path();
            let size = entry_size(&path).await?;
            if !dry_run {
                if metadata.is_dir() {
                    tokio::fs::remove_dir_all(&path).await?;
                } else {
                    tokio::fs::remove_file(&path).await?;
                }
                log::info!("Removed stale upload {}", path.display());
            }
            report.bytes_freed += size;
            report.removed.push(path);
        }

        report.removed.sort();
        Ok(report)
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(SchemaError::Upload(format!("invalid upload key '{key}'")));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl UploadStore for DiskUploadStore {
    async fn resolve(&self, key: &str) -> Result<ResolvedUpload> {
        let entry = self.entry_path(key)?;
        let metadata = tokio::fs::metadata(&entry)
            .await
            .map_err(|_| SchemaError::NotFound(format!("upload {key}")))?;

        let path = if metadata.is_dir() {
            first_file_in(&entry)
                .await?
                .ok_or_else(|| SchemaError::Upload(format!("upload {key} is incomplete")))?
        } else {
            entry
        };

        let size = tokio::fs::metadata(&path).await?.len();
        if size > self.max_size {
            return Err(SchemaError::Upload(format!(
                "upload {key} is {size} bytes, limit is {}",
                self.max_size
            )));
        }

        let mut head = Vec::with_capacity(SNIFF_LEN);
        tokio::fs::File::open(&path)
            .await?
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut head)
            .await?;

        Ok(ResolvedUpload {
            key: key.to_string(),
            mime_type: sniff_mime(&head, None),
            path,
            size,
        })
    }
}

async fn first_file_in(dir: &Path) -> Result<Option<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files.into_iter().next())
}

async fn entry_size(path: &Path) -> Result<u64> {
    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_dir() {
        return Ok(metadata.len());
    }

    let mut total = 0;
    let mut pending = vec![path.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                pending.push(entry.path());
            } else {
                total += metadata.len();
            }
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_file_and_directory() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("plain"), b"hello upload").unwrap();
        std::fs::create_dir(root.path().join("chunked")).unwrap();
        std::fs::write(root.path().join("chunked").join("data"), b"%PDF-1.7 body").unwrap();

        let store = DiskUploadStore::new(root.path(), 1024);

        let plain = store.resolve("plain").await.unwrap();
        assert_eq!(plain.mime_type, "text/plain");
        assert_eq!(plain.size, 12);

        let chunked = store.resolve("chunked").await.unwrap();
        assert_eq!(chunked.mime_type, "application/pdf");
        assert!(chunked.path.ends_with("chunked/data"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_bad_keys_and_large_files() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("big"), vec![b'a'; 64]).unwrap();
        let store = DiskUploadStore::new(root.path(), 16);

        assert!(matches!(store.resolve("../etc").await, Err(SchemaError::Upload(_))));
        assert!(matches!(store.resolve("").await, Err(SchemaError::Upload(_))));
        assert!(matches!(store.resolve("missing").await, Err(SchemaError::NotFound(_))));
        assert!(matches!(store.resolve("big").await, Err(SchemaError::Upload(_))));
    }

    #[tokio::test]
    async fn test_clean_missing_root_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let store = DiskUploadStore::new(root.path().join("absent"), 16);
        let report = store.clean_stale(Duration::ZERO, false).await.unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(report.kept, 0);
    }
}
