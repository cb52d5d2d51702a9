//! Chart template loading
//!
//! A chart is a directory laid out the way Helm lays it out:
//!
//! ```text
//! my-chart/
//!   Chart.yaml
//!   values.yaml        # default values document
//!   templates/         # MiniJinja templates
//! ```

use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// File name of the chart definition
pub const CHART_FILE: &str = "Chart.yaml";

/// File name of the default values document
pub const VALUES_FILE: &str = "values.yaml";

/// Chart metadata from `Chart.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Chart name
    pub name: String,

    /// Chart version (SemVer)
    pub version: Version,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Application version the chart ships by default
    #[serde(default)]
    pub app_version: Option<String>,
}

/// Raw `Chart.yaml` document
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartFile {
    #[serde(default)]
    api_version: Option<String>,

    #[serde(flatten)]
    metadata: ChartMetadata,
}

/// A chart directory with resolved paths
#[derive(Debug, Clone)]
pub struct LoadedChart {
    /// Chart metadata
    pub metadata: ChartMetadata,

    /// Canonical root directory of the chart
    pub root: PathBuf,

    /// Templates directory
    pub templates_dir: PathBuf,

    /// Default values document
    pub values_path: PathBuf,
}

impl LoadedChart {
    /// Load a chart from a directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref();

        if !root.is_dir() {
            return Err(CoreError::ChartNotFound {
                path: root.display().to_string(),
            });
        }

        // Stored with releases, so it must not depend on the working directory
        let root = root.canonicalize()?;

        let chart_file = root.join(CHART_FILE);
        if !chart_file.exists() {
            return Err(CoreError::InvalidChart {
                path: root.display().to_string(),
                message: format!("{} not found", CHART_FILE),
            });
        }

        let content = std::fs::read_to_string(&chart_file)?;
        let parsed: ChartFile =
            serde_yaml::from_str(&content).map_err(|e| CoreError::InvalidChart {
                path: chart_file.display().to_string(),
                message: e.to_string(),
            })?;

        if let Some(api_version) = &parsed.api_version
            && api_version != "v2"
        {
            return Err(CoreError::InvalidChart {
                path: chart_file.display().to_string(),
                message: format!("unsupported apiVersion {}, expected v2", api_version),
            });
        }

        let values_path = root.join(VALUES_FILE);
        if !values_path.is_file() {
            return Err(CoreError::InvalidChart {
                path: root.display().to_string(),
                message: format!("{} not found", VALUES_FILE),
            });
        }

        Ok(Self {
            metadata: parsed.metadata,
            templates_dir: root.join("templates"),
            values_path,
            root,
        })
    }

    /// Read the default values document as text
    pub fn default_values(&self) -> Result<String> {
        Ok(std::fs::read_to_string(&self.values_path)?)
    }

    /// Get list of template files, sorted
    pub fn template_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        if !self.templates_dir.exists() {
            return Ok(files);
        }

        for entry in walkdir::WalkDir::new(&self.templates_dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file()
                && let Some(ext) = path.extension()
            {
                let ext = ext.to_string_lossy().to_lowercase();
                if matches!(ext.as_str(), "yaml" | "yml" | "j2" | "jinja2" | "txt" | "tpl") {
                    files.push(path.to_path_buf());
                }
            }
        }

        files.sort();
        Ok(files)
    }
}
