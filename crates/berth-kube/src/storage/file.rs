//! File-based storage driver
//!
//! Stores release records under a local directory, for working without a
//! cluster-side store:
//!
//! ```text
//! <base>/<namespace>/<name>/v<revision>.json
//! ```
//!
//! Each file is a small envelope holding the compression method and the same
//! base64 payload the Secrets driver writes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{
    CompressionMethod, StorageConfig, StorageDriver, decode_from_storage, encode_for_storage,
    latest_only,
};
use crate::error::{KubeError, Result};
use crate::release::StoredRelease;

#[derive(Serialize, Deserialize)]
struct Envelope {
    compression: String,
    release: String,
}

/// File-based storage driver
pub struct FileDriver {
    base_dir: PathBuf,
    config: StorageConfig,
}

impl FileDriver {
    /// Create a new file driver, creating `base_dir` if needed
    pub fn new(base_dir: PathBuf, config: StorageConfig) -> Result<Self> {
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir, config })
    }

    fn release_path(&self, namespace: &str, name: &str, revision: u32) -> PathBuf {
        self.release_dir(namespace, name)
            .join(format!("v{}.json", revision))
    }

    fn release_dir(&self, namespace: &str, name: &str) -> PathBuf {
        self.base_dir.join(namespace).join(name)
    }

    fn write_release(&self, release: &StoredRelease) -> Result<()> {
        let path = self.release_path(&release.namespace, &release.name, release.revision);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let envelope = Envelope {
            compression: self.config.compression.label().to_string(),
            release: encode_for_storage(release, &self.config)?,
        };
        std::fs::write(&path, serde_json::to_vec_pretty(&envelope)?)?;
        Ok(())
    }

    fn read_release(&self, path: &Path) -> Result<StoredRelease> {
        let data = std::fs::read(path)?;
        let envelope: Envelope = serde_json::from_slice(&data)?;
        let compression =
            CompressionMethod::from_label(Some(envelope.compression.as_str()), self.config.compression);
        decode_from_storage(&envelope.release, compression)
    }

    fn read_dir_releases(&self, dir: &Path) -> Result<Vec<StoredRelease>> {
        let mut releases = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                match self.read_release(&path) {
                    Ok(release) => releases.push(release),
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable release file"),
                }
            }
        }
        Ok(releases)
    }

    fn remove_if_empty(dir: &Path) -> Result<()> {
        if dir.exists() && std::fs::read_dir(dir)?.next().is_none() {
            std::fs::remove_dir(dir)?;
        }
        Ok(())
    }

    /// Every revision of a release, newest first
    fn history(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>> {
        let dir = self.release_dir(namespace, name);
        if !dir.exists() {
            return Err(Self::not_found(namespace, name));
        }

        let mut releases = self.read_dir_releases(&dir)?;
        releases.sort_by(|a, b| b.revision.cmp(&a.revision));

        if releases.is_empty() {
            return Err(Self::not_found(namespace, name));
        }

        Ok(releases)
    }

    fn not_found(namespace: &str, name: &str) -> KubeError {
        KubeError::ReleaseNotFound {
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }
}

#[async_trait]
impl StorageDriver for FileDriver {
    async fn get_latest(&self, namespace: &str, name: &str) -> Result<StoredRelease> {
        self.history(namespace, name)?
            .into_iter()
            .next()
            .ok_or_else(|| Self::not_found(namespace, name))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<StoredRelease>> {
        let ns_path = self.base_dir.join(namespace);
        if !ns_path.exists() {
            return Ok(Vec::new());
        }

        let mut releases = Vec::new();
        for entry in std::fs::read_dir(&ns_path)? {
            let path = entry?.path();
            if path.is_dir() {
                releases.extend(self.read_dir_releases(&path)?);
            }
        }

        releases.sort_by(|a, b| b.revision.cmp(&a.revision));
        latest_only(&mut releases);
        Ok(releases)
    }

    async fn create(&self, release: &StoredRelease) -> Result<()> {
        let path = self.release_path(&release.namespace, &release.name, release.revision);
        if path.exists() {
            return Err(KubeError::ReleaseAlreadyExists {
                name: release.name.clone(),
                namespace: release.namespace.clone(),
            });
        }

        self.write_release(release)
    }

    async fn update(&self, release: &StoredRelease) -> Result<()> {
        let path = self.release_path(&release.namespace, &release.name, release.revision);
        if !path.exists() {
            return Err(Self::not_found(&release.namespace, &release.name));
        }

        self.write_release(release)
    }

    async fn delete_all(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>> {
        let releases = self.history(namespace, name)?;
        std::fs::remove_dir_all(self.release_dir(namespace, name))?;
        Self::remove_if_empty(&self.base_dir.join(namespace))?;

        Ok(releases)
    }
}
