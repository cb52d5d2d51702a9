//! Kubernetes Secrets storage driver
//!
//! The default driver. Each revision is one Secret in the release namespace,
//! named `sh.berth.release.v1.<name>.v<revision>`, whose `release` key holds
//! the encoded record.

use async_trait::async_trait;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Client;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use std::collections::BTreeMap;

use super::{
    COMPRESSION_LABEL, CompressionMethod, MANAGED_BY_LABEL, MAX_RESOURCE_SIZE, RELEASE_NAME_LABEL,
    StorageConfig, StorageDriver, decode_from_storage, encode_for_storage, latest_only,
    storage_labels,
};
use crate::error::{KubeError, Result};
use crate::release::StoredRelease;

/// Secret type marking berth release records
pub const SECRET_TYPE: &str = "berth.io/release.v1";

/// Kubernetes Secrets storage driver
pub struct SecretsDriver {
    client: Client,
    config: StorageConfig,
}

impl SecretsDriver {
    /// Create a new Secrets driver from the default kubeconfig
    pub async fn new(config: StorageConfig) -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client, config })
    }

    fn secrets_api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn build_secret(&self, release: &StoredRelease) -> Result<Secret> {
        let encoded = encode_for_storage(release, &self.config)?;
        if encoded.len() > MAX_RESOURCE_SIZE {
            return Err(KubeError::Storage(format!(
                "release '{}' is too large to store ({} bytes, max {})",
                release.name,
                encoded.len(),
                MAX_RESOURCE_SIZE
            )));
        }

        let mut labels = storage_labels(release);
        labels.insert(
            COMPRESSION_LABEL.to_string(),
            self.config.compression.label().to_string(),
        );

        let mut data = BTreeMap::new();
        data.insert("release".to_string(), ByteString(encoded.into_bytes()));

        Ok(Secret {
            metadata: ObjectMeta {
                name: Some(release.storage_key()),
                namespace: Some(release.namespace.clone()),
                labels: Some(labels),
                ..Default::default()
            },
            type_: Some(SECRET_TYPE.to_string()),
            data: Some(data),
            ..Default::default()
        })
    }

    /// Every revision of a release, newest first
    async fn history(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>> {
        let releases = self.list_secrets(namespace, Some(name)).await?;

        if releases.is_empty() {
            return Err(KubeError::ReleaseNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            });
        }

        Ok(releases)
    }

    async fn list_secrets(&self, namespace: &str, name: Option<&str>) -> Result<Vec<StoredRelease>> {
        let mut selector = format!("{}=berth", MANAGED_BY_LABEL);
        if let Some(name) = name {
            selector.push_str(&format!(",{}={}", RELEASE_NAME_LABEL, name));
        }

        let lp = ListParams::default().labels(&selector);
        let secrets = self.secrets_api(namespace).list(&lp).await?;

        let mut releases = Vec::with_capacity(secrets.items.len());
        for secret in &secrets.items {
            match parse_secret(secret, self.config.compression) {
                Ok(release) => releases.push(release),
                Err(e) => tracing::warn!(
                    secret = secret.metadata.name.as_deref().unwrap_or("<unnamed>"),
                    error = %e,
                    "skipping unreadable release record"
                ),
            }
        }

        releases.sort_by(|a, b| b.revision.cmp(&a.revision));
        Ok(releases)
    }
}

/// Decode the record held by a release Secret
///
/// The compression label wins over the driver's configured method, so records
/// written under an older setting stay readable.
fn parse_secret(secret: &Secret, default: CompressionMethod) -> Result<StoredRelease> {
    let data = secret
        .data
        .as_ref()
        .and_then(|d| d.get("release"))
        .ok_or_else(|| KubeError::Storage("Secret missing 'release' data".to_string()))?;

    let encoded = std::str::from_utf8(&data.0)
        .map_err(|e| KubeError::Storage(format!("Invalid UTF-8 in secret: {}", e)))?;

    let label = secret
        .metadata
        .labels
        .as_ref()
        .and_then(|l| l.get(COMPRESSION_LABEL))
        .map(String::as_str);

    decode_from_storage(encoded, CompressionMethod::from_label(label, default))
}

#[async_trait]
impl StorageDriver for SecretsDriver {
    async fn get_latest(&self, namespace: &str, name: &str) -> Result<StoredRelease> {
        let history = self.history(namespace, name).await?;
        history
            .into_iter()
            .next()
            .ok_or_else(|| KubeError::ReleaseNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            })
    }

    async fn list(&self, namespace: &str) -> Result<Vec<StoredRelease>> {
        let mut releases = self.list_secrets(namespace, None).await?;
        latest_only(&mut releases);
        Ok(releases)
    }

    async fn create(&self, release: &StoredRelease) -> Result<()> {
        let secret = self.build_secret(release)?;
        tracing::debug!(secret = %release.storage_key(), "creating release record");

        match self
            .secrets_api(&release.namespace)
            .create(&PostParams::default(), &secret)
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 409 => Err(KubeError::ReleaseAlreadyExists {
                name: release.name.clone(),
                namespace: release.namespace.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, release: &StoredRelease) -> Result<()> {
        let key = release.storage_key();
        let secret = self.build_secret(release)?;
        tracing::debug!(secret = %key, state = release.state.status_name(), "updating release record");

        match self
            .secrets_api(&release.namespace)
            .replace(&key, &PostParams::default(), &secret)
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Err(KubeError::ReleaseNotFound {
                name: release.name.clone(),
                namespace: release.namespace.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_all(&self, namespace: &str, name: &str) -> Result<Vec<StoredRelease>> {
        let releases = self.history(namespace, name).await?;
        let api = self.secrets_api(namespace);

        for release in &releases {
            match api
                .delete(&release.storage_key(), &DeleteParams::default())
                .await
            {
                Ok(_) => {}
                Err(kube::Error::Api(e)) if e.code == 404 => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(releases)
    }
}
