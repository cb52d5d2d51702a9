//! Core error types

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Chart not found: {path}")]
    ChartNotFound { path: String },

    #[error("Invalid chart at {path}: {message}")]
    InvalidChart { path: String, message: String },

    #[error("values.yaml of chart '{chart}' does not match the {archetype} schema: {message}")]
    SchemaMismatch {
        chart: String,
        archetype: String,
        message: String,
    },

    #[error("Unknown archetype '{0}' (expected 'api' or 'host')")]
    UnknownArchetype(String),

    #[error("Chart '{name}' is not defined in the configuration")]
    UnknownChart { name: String },

    #[error("Config directory {} does not exist or is not a directory", root.display())]
    ConfigDirNotFound { root: PathBuf },

    #[error("Config directory {} doesn't include {name}", root.display())]
    MissingArtifact { name: String, root: PathBuf },

    #[error("{name} found more than once: {} and {}", first.display(), second.display())]
    DuplicateArtifact {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),

    #[error("Failed to walk {}: {message}", root.display())]
    Walk { root: PathBuf, message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
