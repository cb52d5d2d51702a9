//! Error types for berth-kube

use thiserror::Error;

/// Result type for berth-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur during release and cluster operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Cluster call failed
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    #[error("release '{name}' not found in namespace '{namespace}'")]
    ReleaseNotFound { name: String, namespace: String },

    /// Create hit an existing revision
    #[error("release '{name}' already exists in namespace '{namespace}'")]
    ReleaseAlreadyExists { name: String, namespace: String },

    /// A pending record blocks the call
    #[error("another operation is in progress for release '{name}': {status}")]
    OperationInProgress { name: String, status: String },

    /// Stored release was written for a different archetype
    #[error("release '{name}' is a {actual} release, not {expected}")]
    ArchetypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Applying manifests failed
    #[error("failed to apply release '{name}': {message}")]
    ApplyFailed { name: String, message: String },

    /// Release store failure outside the API itself
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("compression error: {0}")]
    Compression(String),

    /// Chart or values error
    #[error(transparent)]
    Chart(#[from] berth_core::CoreError),

    /// Chart templates failed to render
    #[error(transparent)]
    Template(#[from] berth_engine::EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A rendered document is not a usable Kubernetes object
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
}

macro_rules! serialization_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for KubeError {
            fn from(err: $ty) -> Self {
                Self::Serialization(err.to_string())
            }
        })*
    };
}

serialization_from!(serde_json::Error, serde_yaml::Error);
