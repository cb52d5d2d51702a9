//! Berth Kube - release management on Kubernetes
//!
//! This crate provides:
//! - **Release records**: stored revisions with a small state machine
//! - **Storage drivers**: Kubernetes Secrets (default), local files, in-memory mock
//! - **Manifest appliers**: Server-Side Apply through API discovery, or a recording mock
//! - **Values rendering**: typed documents loaded from a chart and mutated by the caller
//! - **Listings**: numbered release tables for interactive selection
//! - **Release client**: install (upsert), version update, uninstall and output

pub mod client;
pub mod error;
pub mod index;
pub mod release;
pub mod renderer;
pub mod resources;
pub mod storage;

pub use client::{InstallOptions, ReleaseClient};
pub use error::{KubeError, Result};
pub use index::{ReleaseListing, ReleaseSummary, SelectionError};
pub use release::{ChartRef, ReleaseSpec, ReleaseState, StoredRelease};
pub use renderer::{RenderedValues, ValuesRenderer};
pub use resources::{
    AppliedAction, AppliedCall, ClusterApplier, ManifestApplier, MockApplier, OperationSummary,
    ResourceManager,
};
pub use storage::{
    CompressionMethod, FileDriver, MockStorageDriver, OperationCounts, SecretsDriver, StorageConfig,
    StorageDriver,
};
