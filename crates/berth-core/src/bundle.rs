//! Configuration bundle discovery
//!
//! A bundle is a directory tree that contains exactly one settings artifact
//! and one logging artifact, at any depth. Their raw text ends up in the
//! workload's ConfigMap.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{CoreError, Result};

/// File names the loader looks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSpec {
    #[serde(default = "default_settings_file")]
    pub settings_file: String,

    #[serde(default = "default_logging_file")]
    pub logging_file: String,
}

fn default_settings_file() -> String {
    "appsettings.json".to_string()
}

fn default_logging_file() -> String {
    "log4net.config".to_string()
}

impl Default for BundleSpec {
    fn default() -> Self {
        Self {
            settings_file: default_settings_file(),
            logging_file: default_logging_file(),
        }
    }
}

/// Raw contents of a loaded bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigBundle {
    pub settings: String,
    pub logging: String,
    pub settings_path: PathBuf,
    pub logging_path: PathBuf,
}

impl ConfigBundle {
    /// Walk `root` and read both artifacts
    pub fn load<P: AsRef<Path>>(root: P, spec: &BundleSpec) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(CoreError::ConfigDirNotFound {
                root: root.to_path_buf(),
            });
        }

        let mut settings_path: Option<PathBuf> = None;
        let mut logging_path: Option<PathBuf> = None;

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| walk_error(root, e))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            let slot = if file_name == spec.settings_file.as_str() {
                &mut settings_path
            } else if file_name == spec.logging_file.as_str() {
                &mut logging_path
            } else {
                continue;
            };

            if let Some(first) = slot.as_ref() {
                return Err(CoreError::DuplicateArtifact {
                    name: file_name.into_owned(),
                    first: first.clone(),
                    second: entry.path().to_path_buf(),
                });
            }
            *slot = Some(entry.path().to_path_buf());
        }

        let settings_path = settings_path.ok_or_else(|| CoreError::MissingArtifact {
            name: spec.settings_file.clone(),
            root: root.to_path_buf(),
        })?;
        let logging_path = logging_path.ok_or_else(|| CoreError::MissingArtifact {
            name: spec.logging_file.clone(),
            root: root.to_path_buf(),
        })?;

        tracing::debug!(
            settings = %settings_path.display(),
            logging = %logging_path.display(),
            "located config bundle"
        );

        Ok(Self {
            settings: std::fs::read_to_string(&settings_path)?,
            logging: std::fs::read_to_string(&logging_path)?,
            settings_path,
            logging_path,
        })
    }
}

fn walk_error(root: &Path, err: walkdir::Error) -> CoreError {
    match err.into_io_error() {
        Some(io) => CoreError::Io(io),
        None => CoreError::Walk {
            root: root.to_path_buf(),
            message: "filesystem loop detected".to_string(),
        },
    }
}
