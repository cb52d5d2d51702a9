//! Error types for berth-image

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImageError>;

/// Failures of the build / login / push steps
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image build failed for {tag}: {stderr}")]
    Build { tag: String, stderr: String },

    #[error("registry login failed for region {region}: {stderr}")]
    Login { region: String, stderr: String },

    #[error("image push failed for {tag}: {stderr}")]
    Push { tag: String, stderr: String },

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ImageError {
    /// Step that failed, for progress output
    pub fn step(&self) -> &'static str {
        match self {
            Self::Build { .. } => "build",
            Self::Login { .. } => "login",
            Self::Push { .. } => "push",
            Self::Spawn { .. } => "spawn",
        }
    }
}
