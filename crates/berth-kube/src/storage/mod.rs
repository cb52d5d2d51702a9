//! Storage drivers for persisting release records
//!
//! - **Secrets** (default): one Kubernetes Secret per revision
//! - **File**: JSON files under a local directory
//! - **Mock**: in memory, for tests
//!
//! Records are JSON, compressed (zstd by default) and base64-encoded.

mod file;
mod mock;
mod secrets;

pub use file::FileDriver;
pub use mock::{MockStorageDriver, OperationCounts};
pub use secrets::SecretsDriver;

use async_trait::async_trait;
use berth_core::Compression;

use crate::error::{KubeError, Result};
use crate::release::StoredRelease;

/// Maximum size for a single Kubernetes Secret (1MB - some overhead)
pub const MAX_RESOURCE_SIZE: usize = 1_000_000;

/// Label set on every record the drivers write
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const RELEASE_NAME_LABEL: &str = "berth.io/release-name";
pub const RELEASE_REVISION_LABEL: &str = "berth.io/release-revision";
pub const ARCHETYPE_LABEL: &str = "berth.io/archetype";
pub const COMPRESSION_LABEL: &str = "berth.io/compression";

/// Storage driver trait for release persistence
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Get the latest revision of a release
    async fn get_latest(&self, namespace: &str, name: &str) -> Result<StoredRelease>;

    /// Latest revision of each release in a namespace
    async fn list(&self, namespace: &str) -> Result<Vec<StoredRelease>>;

    /// Create a new revision
    async fn create(&self, release: &StoredRelease) -> Result<()>;

    /// Update an existing revision
    async fn update(&self, release: &StoredRelease) -> Result<()>;

    /// Delete all revisions of a release, returning them newest first
    async fn delete_all(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>>;
}

#[async_trait]
impl<D: StorageDriver + ?Sized> StorageDriver for Box<D> {
    async fn get_latest(&self, namespace: &str, name: &str) -> Result<StoredRelease> {
        (**self).get_latest(namespace, name).await
    }

    async fn list(&self, namespace: &str) -> Result<Vec<StoredRelease>> {
        (**self).list(namespace).await
    }

    async fn create(&self, release: &StoredRelease) -> Result<()> {
        (**self).create(release).await
    }

    async fn update(&self, release: &StoredRelease) -> Result<()> {
        (**self).update(release).await
    }

    async fn delete_all(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>> {
        (**self).delete_all(namespace, name).await
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Compression method
    pub compression: CompressionMethod,
}

impl From<Compression> for StorageConfig {
    fn from(compression: Compression) -> Self {
        Self {
            compression: compression.into(),
        }
    }
}

/// Compression method for release data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// No compression
    None,

    /// Gzip compression
    Gzip { level: u32 },

    /// Zstd compression
    Zstd { level: i32 },
}

impl Default for CompressionMethod {
    fn default() -> Self {
        Self::Zstd { level: 3 }
    }
}

impl From<Compression> for CompressionMethod {
    fn from(compression: Compression) -> Self {
        match compression {
            Compression::None => Self::None,
            Compression::Gzip => Self::Gzip { level: 6 },
            Compression::Zstd => Self::Zstd { level: 3 },
        }
    }
}

impl CompressionMethod {
    /// Label value recorded next to the payload
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip { .. } => "gzip",
            Self::Zstd { .. } => "zstd",
        }
    }

    /// Parse a label value, falling back to `default` for unknown values
    pub fn from_label(label: Option<&str>, default: CompressionMethod) -> Self {
        match label {
            Some("none") => Self::None,
            Some("gzip") => Self::Gzip { level: 6 },
            Some("zstd") => Self::Zstd { level: 3 },
            _ => default,
        }
    }
}

/// Compress data using the configured method
pub fn compress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Gzip { level } => {
            use std::io::Write;
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::new(level));
            encoder
                .write_all(data)
                .map_err(|e| KubeError::Compression(e.to_string()))?;
            encoder
                .finish()
                .map_err(|e| KubeError::Compression(e.to_string()))
        }
        CompressionMethod::Zstd { level } => zstd::encode_all(std::io::Cursor::new(data), level)
            .map_err(|e| KubeError::Compression(e.to_string())),
    }
}

/// Decompress data
pub fn decompress(data: &[u8], method: CompressionMethod) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Gzip { .. } => {
            use std::io::Read;
            let mut decoder = flate2::read::GzDecoder::new(data);
            let mut decompressed = Vec::new();
            decoder
                .read_to_end(&mut decompressed)
                .map_err(|e| KubeError::Compression(e.to_string()))?;
            Ok(decompressed)
        }
        CompressionMethod::Zstd { .. } => zstd::decode_all(std::io::Cursor::new(data))
            .map_err(|e| KubeError::Compression(e.to_string())),
    }
}

/// Encode a release for storage (serialize + compress + base64)
pub fn encode_for_storage(release: &StoredRelease, config: &StorageConfig) -> Result<String> {
    let json = serde_json::to_vec(release)?;
    let compressed = compress(&json, config.compression)?;
    Ok(base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        &compressed,
    ))
}

/// Decode a release from storage (base64 + decompress + deserialize)
pub fn decode_from_storage(data: &str, compression: CompressionMethod) -> Result<StoredRelease> {
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, data.trim())
        .map_err(|e| KubeError::Serialization(format!("base64 decode error: {}", e)))?;
    let decompressed = decompress(&decoded, compression)?;
    Ok(serde_json::from_slice(&decompressed)?)
}

/// Labels applied to all storage resources
pub fn storage_labels(release: &StoredRelease) -> std::collections::BTreeMap<String, String> {
    let mut labels = std::collections::BTreeMap::new();
    labels.insert(MANAGED_BY_LABEL.to_string(), "berth".to_string());
    labels.insert(RELEASE_NAME_LABEL.to_string(), release.name.clone());
    labels.insert(RELEASE_REVISION_LABEL.to_string(), release.revision.to_string());
    labels.insert(ARCHETYPE_LABEL.to_string(), release.archetype.to_string());
    labels
}

/// Keep only the newest revision of each release name
///
/// Expects `releases` sorted newest revision first.
pub(crate) fn latest_only(releases: &mut Vec<StoredRelease>) {
    let mut seen = std::collections::HashSet::new();
    releases.retain(|r| seen.insert(format!("{}/{}", r.namespace, r.name)));
}
