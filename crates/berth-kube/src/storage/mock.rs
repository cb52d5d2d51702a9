//! Mock storage driver for testing
//!
//! Keeps releases in memory so release flows can be tested without a cluster.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{StorageDriver, latest_only};
use crate::error::{KubeError, Result};
use crate::release::StoredRelease;

/// namespace -> name -> revision -> release
type Store = HashMap<String, HashMap<String, BTreeMap<u32, StoredRelease>>>;

/// In-memory storage driver for testing
#[derive(Clone, Default)]
pub struct MockStorageDriver {
    store: Arc<RwLock<Store>>,
    operations: Arc<RwLock<OperationCounts>>,
}

/// Counts of operations performed, for assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub gets: usize,
    pub lists: usize,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl MockStorageDriver {
    /// Create a new empty mock driver
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-populated releases
    pub fn with_releases(releases: Vec<StoredRelease>) -> Self {
        let driver = Self::new();
        {
            let mut store = driver.write_store();
            for release in releases {
                store
                    .entry(release.namespace.clone())
                    .or_default()
                    .entry(release.name.clone())
                    .or_default()
                    .insert(release.revision, release);
            }
        }
        driver
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.operations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Count stored revisions
    pub fn release_count(&self) -> usize {
        self.read_store()
            .values()
            .flat_map(|ns| ns.values())
            .map(BTreeMap::len)
            .sum()
    }

    fn read_store(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, Store> {
        self.store.write().unwrap_or_else(|e| e.into_inner())
    }

    fn count(&self, f: impl FnOnce(&mut OperationCounts)) {
        f(&mut self.operations.write().unwrap_or_else(|e| e.into_inner()));
    }

    fn not_found(namespace: &str, name: &str) -> KubeError {
        KubeError::ReleaseNotFound {
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }
}

#[async_trait]
impl StorageDriver for MockStorageDriver {
    async fn get_latest(&self, namespace: &str, name: &str) -> Result<StoredRelease> {
        self.count(|c| c.gets += 1);

        self.read_store()
            .get(namespace)
            .and_then(|ns| ns.get(name))
            .and_then(|revisions| revisions.values().next_back())
            .cloned()
            .ok_or_else(|| Self::not_found(namespace, name))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<StoredRelease>> {
        self.count(|c| c.lists += 1);

        let mut releases: Vec<StoredRelease> = self
            .read_store()
            .get(namespace)
            .map(|names| {
                names
                    .values()
                    .flat_map(|revisions| revisions.values())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        releases.sort_by(|a, b| b.revision.cmp(&a.revision));
        latest_only(&mut releases);
        Ok(releases)
    }

    async fn create(&self, release: &StoredRelease) -> Result<()> {
        self.count(|c| c.creates += 1);

        let mut store = self.write_store();
        let revisions = store
            .entry(release.namespace.clone())
            .or_default()
            .entry(release.name.clone())
            .or_default();

        if revisions.contains_key(&release.revision) {
            return Err(KubeError::ReleaseAlreadyExists {
                name: release.name.clone(),
                namespace: release.namespace.clone(),
            });
        }

        revisions.insert(release.revision, release.clone());
        Ok(())
    }

    async fn update(&self, release: &StoredRelease) -> Result<()> {
        self.count(|c| c.updates += 1);

        let mut store = self.write_store();
        let revision = store
            .get_mut(&release.namespace)
            .and_then(|ns| ns.get_mut(&release.name))
            .and_then(|revisions| revisions.get_mut(&release.revision))
            .ok_or_else(|| Self::not_found(&release.namespace, &release.name))?;

        *revision = release.clone();
        Ok(())
    }

    async fn delete_all(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>> {
        self.count(|c| c.deletes += 1);

        let releases: Vec<StoredRelease> = self
            .write_store()
            .get_mut(namespace)
            .and_then(|ns| ns.remove(name))
            .map(|revisions| revisions.into_values().rev().collect())
            .unwrap_or_default();

        if releases.is_empty() {
            return Err(Self::not_found(namespace, name));
        }

        Ok(releases)
    }
}
