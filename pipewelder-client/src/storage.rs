//! Object storage
//!
//! Pipeline task files are mirrored to an object store under a
//! per-pipeline prefix. [`FsObjectStorage`] is a plain file-copy
//! implementation rooted at a local directory, one subdirectory per bucket.

use async_trait::async_trait;
use reqwest::Url;
use std::path::{Component, Path, PathBuf};

use crate::error::{ClientError, Result};

/// Minimal object store interface used by uploads
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// List the keys in `bucket` that start with `prefix`
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    /// Delete `keys` from `bucket`
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()>;

    /// Store `body` at `key` in `bucket`, replacing any existing object
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;
}

/// A bucket and key prefix parsed from an `s3://bucket/prefix` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    pub bucket: String,
    pub prefix: String,
}

impl StorageLocation {
    /// Parse a storage URI
    ///
    /// # Example
    /// ```
    /// use pipewelder_client::StorageLocation;
    ///
    /// let location = StorageLocation::parse("s3://pipewelder-bucket/pipewelder-test/inputs").unwrap();
    /// assert_eq!(location.bucket, "pipewelder-bucket");
    /// assert_eq!(location.prefix, "pipewelder-test/inputs");
    /// ```
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri).map_err(|e| ClientError::InvalidLocation(format!("{}: {}", uri, e)))?;
        let bucket = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ClientError::InvalidLocation(format!("{}: no bucket", uri)))?;

        Ok(Self {
            bucket: bucket.to_string(),
            prefix: url.path().trim_matches('/').to_string(),
        })
    }

    /// Key of `relative` under this location's prefix
    pub fn key(&self, relative: &str) -> String {
        let relative = relative.trim_start_matches('/');
        if self.prefix.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", self.prefix, relative)
        }
    }
}

/// File-copy object storage rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsObjectStorage {
    root: PathBuf,
}

impl FsObjectStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        Ok(self.root.join(checked_relative(bucket)?))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        Ok(self.bucket_dir(bucket)?.join(checked_relative(key)?))
    }
}

/// Reject keys that would escape the bucket directory
fn checked_relative(key: &str) -> Result<&Path> {
    let path = Path::new(key);
    let escapes = key.is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(ClientError::InvalidLocation(format!(
            "'{}' is not a relative key",
            key
        )));
    }
    Ok(path)
}

/// Every file under `root` as a `/`-separated path relative to it, sorted
pub async fn relative_files(root: &Path) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
                continue;
            }
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            files.push(
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/"),
            );
        }
    }

    files.sort();
    Ok(files)
}

#[async_trait]
impl ObjectStorage for FsObjectStorage {
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let bucket_dir = self.bucket_dir(bucket)?;
        if !tokio::fs::try_exists(&bucket_dir).await? {
            return Ok(Vec::new());
        }

        let keys = relative_files(&bucket_dir)
            .await?
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect();
        Ok(keys)
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<()> {
        for key in keys {
            let path = self.object_path(bucket, key)?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        Ok(())
    }
}
