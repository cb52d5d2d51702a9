//! Berth configuration
//!
//! Stored in `~/.config/berth/config.yaml` unless `--config-file` says
//! otherwise. The file names the charts berth can deploy, which of them is
//! current, and how release records are stored.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::archetype::Archetype;
use crate::bundle::BundleSpec;
use crate::error::{CoreError, Result};

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BerthConfig {
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Name of the chart commands operate on
    pub current_chart: String,

    /// Deployable charts
    #[serde(default)]
    pub charts: Vec<ChartDescriptor>,

    /// Config bundle artifact names
    #[serde(default)]
    pub bundle: BundleSpec,

    /// Release record storage
    #[serde(default)]
    pub storage: StorageSettings,
}

fn default_api_version() -> String {
    "berth.io/v1".to_string()
}

/// One deployable chart pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDescriptor {
    /// Base name used when deriving release names
    pub name: String,

    /// Namespace releases are installed into
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Container repository images are pushed to
    pub repository: String,

    /// Registry region used for login
    pub region: String,

    /// Chart directory for the api archetype
    pub api_template: PathBuf,

    /// Chart directory for the game host archetype
    pub game_host_template: PathBuf,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl ChartDescriptor {
    /// Chart directory for an archetype
    pub fn template_for(&self, archetype: Archetype) -> &Path {
        match archetype {
            Archetype::Api => &self.api_template,
            Archetype::GameHost => &self.game_host_template,
        }
    }
}

/// Which release record store to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Kubernetes Secrets in the release namespace
    #[default]
    Secrets,
    /// JSON files in a local directory
    File,
}

/// Compression applied to stored release records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Zstd,
    Gzip,
    None,
}

/// Storage section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSettings {
    #[serde(default)]
    pub driver: StorageBackend,

    /// Directory for the file driver
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub compression: Compression,
}

impl Default for BerthConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            current_chart: "blockraiders".to_string(),
            charts: vec![ChartDescriptor {
                name: "blockraiders".to_string(),
                namespace: default_namespace(),
                repository: "000000000000.dkr.ecr.us-east-1.amazonaws.com/blockraiders"
                    .to_string(),
                region: "us-east-1".to_string(),
                api_template: PathBuf::from("charts/api"),
                game_host_template: PathBuf::from("charts/host"),
            }],
            bundle: BundleSpec::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl BerthConfig {
    /// Get default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| CoreError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("berth").join("config.yaml"))
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration, writing the default first if none exists
    pub fn ensure(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "writing default configuration");
            Self::default().save_to(path)?;
        }
        Self::load_from(path)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get a chart by name
    pub fn get(&self, name: &str) -> Option<&ChartDescriptor> {
        self.charts.iter().find(|c| c.name == name)
    }

    /// The chart named by `currentChart`
    pub fn current_chart(&self) -> Result<&ChartDescriptor> {
        self.get(&self.current_chart)
            .ok_or_else(|| CoreError::UnknownChart {
                name: self.current_chart.clone(),
            })
    }

    /// Switch the current chart
    pub fn use_chart(&mut self, name: &str) -> Result<()> {
        if self.get(name).is_none() {
            return Err(CoreError::UnknownChart {
                name: name.to_string(),
            });
        }
        self.current_chart = name.to_string();
        Ok(())
    }

    /// Resolve a relative path (chart template, file store) against the config
    /// file's directory, yielding an absolute path
    pub fn resolve_path(config_path: &Path, path: &Path) -> PathBuf {
        let joined = match config_path.parent() {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        };
        std::path::absolute(&joined).unwrap_or(joined)
    }

    fn validate(&self) -> Result<()> {
        for (i, chart) in self.charts.iter().enumerate() {
            if chart.name.is_empty() {
                return Err(CoreError::MissingField {
                    field: format!("charts[{}].name", i),
                });
            }
            if self.charts[..i].iter().any(|c| c.name == chart.name) {
                return Err(CoreError::InvalidConfig {
                    message: format!("chart '{}' is defined more than once", chart.name),
                });
            }
        }
        if self.storage.driver == StorageBackend::File && self.storage.path.is_none() {
            return Err(CoreError::MissingField {
                field: "storage.path".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
apiVersion: berth.io/v1
currentChart: lobby
charts:
  - name: blockraiders
    repository: repo/blockraiders
    region: us-east-1
    apiTemplate: charts/api
    gameHostTemplate: charts/host
  - name: lobby
    namespace: games
    repository: repo/lobby
    region: eu-west-1
    apiTemplate: /opt/charts/lobby-api
    gameHostTemplate: /opt/charts/lobby-host
storage:
  driver: file
  path: /var/lib/berth
  compression: gzip
"#;

    #[test]
    fn test_parse_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, CONFIG).unwrap();

        let config = BerthConfig::load_from(&path).unwrap();
        let current = config.current_chart().unwrap();
        assert_eq!(current.name, "lobby");
        assert_eq!(current.namespace, "games");
        assert_eq!(config.get("blockraiders").unwrap().namespace, "default");
        assert_eq!(config.storage.driver, StorageBackend::File);
        assert_eq!(config.storage.compression, Compression::Gzip);
        assert_eq!(config.bundle, BundleSpec::default());
        assert_eq!(
            current.template_for(Archetype::GameHost),
            Path::new("/opt/charts/lobby-host")
        );
    }

    #[test]
    fn test_ensure_writes_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.yaml");

        let config = BerthConfig::ensure(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config, BerthConfig::default());
        assert_eq!(config.storage.driver, StorageBackend::Secrets);

        // Second call reads what was written
        let again = BerthConfig::ensure(&path).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn test_unknown_current_chart() {
        let mut config = BerthConfig::default();
        config.current_chart = "missing".to_string();
        assert!(matches!(
            config.current_chart(),
            Err(CoreError::UnknownChart { name }) if name == "missing"
        ));
    }

    #[test]
    fn test_use_chart() {
        let mut config = BerthConfig::default();
        assert!(config.use_chart("nope").is_err());
        config.use_chart("blockraiders").unwrap();
        assert_eq!(config.current_chart, "blockraiders");
    }

    #[test]
    fn test_file_driver_requires_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "currentChart: x\ncharts: []\nstorage:\n  driver: file\n",
        )
        .unwrap();

        let err = BerthConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, CoreError::MissingField { field } if field == "storage.path"));
    }

    #[test]
    fn test_resolve_path() {
        let config_path = Path::new("/home/me/.config/berth/config.yaml");
        assert_eq!(
            BerthConfig::resolve_path(config_path, Path::new("charts/api")),
            PathBuf::from("/home/me/.config/berth/charts/api")
        );
        assert_eq!(
            BerthConfig::resolve_path(config_path, Path::new("/srv/api")),
            PathBuf::from("/srv/api")
        );
    }

    #[test]
    fn test_resolve_path_with_relative_config() {
        let resolved = BerthConfig::resolve_path(Path::new("config.yaml"), Path::new("charts/api"));
        assert!(resolved.is_absolute());
        assert_eq!(resolved, std::env::current_dir().unwrap().join("charts/api"));
    }
}
