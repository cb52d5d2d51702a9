//! CLI commands

pub mod apply;
pub mod config;
pub mod delete;
pub mod list;
pub mod output;
pub mod update;

use berth_core::{BerthConfig, ChartDescriptor, StorageBackend};
use berth_kube::{
    ClusterApplier, FileDriver, ReleaseClient, ReleaseListing, SecretsDriver, StorageConfig,
    StorageDriver,
};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};
use crate::prompt::prompt_selection;

/// Release client as the commands use it
pub type Client = ReleaseClient<Box<dyn StorageDriver>, ClusterApplier>;

/// Configuration shared by every command of one invocation
pub struct Session {
    pub config_path: PathBuf,
    pub config: BerthConfig,
}

impl Session {
    /// Load the config file, writing the default one if it does not exist
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let config_path = config_path(config_file)?;
        let config = BerthConfig::ensure(&config_path)?;
        Ok(Self { config_path, config })
    }

    pub fn chart(&self) -> Result<&ChartDescriptor> {
        Ok(self.config.current_chart()?)
    }

    /// Release client for the configured store
    ///
    /// The cluster is only contacted once a command applies or deletes
    /// resources.
    pub async fn client(&self) -> Result<Client> {
        let settings = &self.config.storage;
        let storage_config = StorageConfig::from(settings.compression);

        let storage: Box<dyn StorageDriver> = match settings.driver {
            StorageBackend::Secrets => Box::new(SecretsDriver::new(storage_config).await?),
            StorageBackend::File => {
                let path = settings.path.as_deref().ok_or_else(|| {
                    CliError::config_with_help(
                        "the file storage driver needs a directory",
                        "set `storage.path` in the berth config",
                    )
                })?;
                let dir = BerthConfig::resolve_path(&self.config_path, path);
                Box::new(FileDriver::new(dir, storage_config)?)
            }
        };

        Ok(ReleaseClient::new(storage, ClusterApplier::new()))
    }
}

/// `--config-file`, or the per-user default
pub fn config_path(config_file: Option<&Path>) -> Result<PathBuf> {
    match config_file {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(BerthConfig::default_path()?),
    }
}

/// Use `name`, or list the chart's releases and ask for one
pub async fn resolve_release(client: &Client, namespace: &str, name: Option<String>) -> Result<String> {
    if let Some(name) = name {
        return Ok(name);
    }

    let releases = client.list(namespace).await?;
    let listing = ReleaseListing::new(&releases);
    let stdin = io::stdin();
    let chosen = prompt_selection(&listing, stdin.lock(), io::stdout())?;
    Ok(chosen.name.clone())
}
