//! Persistent cache of unfinished upload sessions
//!
//! The cache is a small JSON document mapping a file fingerprint to the
//! session URL and the last offset the service confirmed. It is rewritten
//! through a temporary file and a rename so an interrupted process never
//! leaves a truncated cache behind.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

/// Default cache file name, relative to the working directory
pub const DEFAULT_CACHE_FILE: &str = "access_rest_api_client_storage.json";

/// Number of leading bytes that go into a file fingerprint
pub const FINGERPRINT_PREFIX_LEN: usize = 64 * 1024;

/// Cached state of one unfinished upload
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUpload {
    /// Session URL returned by the service
    pub url: String,
    /// Last offset acknowledged by the service
    pub offset: u64,
}

/// File-backed map of fingerprint to [`StoredUpload`]
#[derive(Debug)]
pub struct UrlStore {
    path: PathBuf,
    entries: BTreeMap<String, StoredUpload>,
}

impl UrlStore {
    /// Load the cache at `path`
    ///
    /// A missing file yields an empty cache. An unreadable document is
    /// discarded with a warning rather than blocking new uploads.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt upload cache");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self { path, entries })
    }

    /// Location of the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached entry for a fingerprint
    pub fn get(&self, fingerprint: &str) -> Option<&StoredUpload> {
        self.entries.get(fingerprint)
    }

    /// Store an entry and persist the cache
    pub async fn set(&mut self, fingerprint: &str, upload: StoredUpload) -> Result<()> {
        self.entries.insert(fingerprint.to_string(), upload);
        self.save().await
    }

    /// Drop an entry and persist the cache
    ///
    /// Removing an unknown fingerprint does not touch the file.
    pub async fn remove(&mut self, fingerprint: &str) -> Result<()> {
        if self.entries.remove(fingerprint).is_some() {
            self.save().await?;
        }
        Ok(())
    }

    async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(&self.entries)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Identify a local file by its size and the SHA-256 of its first 64 KiB
pub async fn fingerprint(path: &Path, size: u64) -> Result<String> {
    let file = tokio::fs::File::open(path).await?;
    let mut prefix = Vec::with_capacity(FINGERPRINT_PREFIX_LEN);
    file.take(FINGERPRINT_PREFIX_LEN as u64)
        .read_to_end(&mut prefix)
        .await?;

    let mut hasher = Sha256::new();
    hasher.update(&prefix);
    hasher.update(size.to_le_bytes());
    Ok(format!("{:x}-{}", hasher.finalize(), size))
}
