//! Release installer
//!
//! [`ReleaseClient`] ties the pieces together: values come from a
//! [`ValuesRenderer`], manifests from the chart engine, records go to a
//! [`StorageDriver`] and resources through a [`ManifestApplier`].
//!
//! Every mutating call follows the same shape: store a pending record, talk
//! to the cluster, then store the outcome. Nothing is retried or rolled back.

use berth_core::{
    ApiValues, Archetype, GameHostValues, LoadedChart, ReleaseInfo, TemplateContext, ValuesSchema,
};
use berth_engine::Engine;
use std::path::{Path, PathBuf};

use crate::error::{KubeError, Result};
use crate::release::{ChartRef, ReleaseSpec, StoredRelease};
use crate::renderer::{RenderedValues, ValuesRenderer, retag};
use crate::resources::{ManifestApplier, OperationSummary};
use crate::storage::StorageDriver;

/// Identity of the release an install targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    pub name: String,
    pub namespace: String,
}

impl InstallOptions {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

/// Installs, upgrades and removes releases
pub struct ReleaseClient<S: StorageDriver, A: ManifestApplier> {
    storage: S,
    applier: A,
    engine: Engine,
}

impl<S: StorageDriver, A: ManifestApplier> ReleaseClient<S, A> {
    pub fn new(storage: S, applier: A) -> Self {
        Self {
            storage,
            applier,
            engine: Engine::builder().strict(true).build(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn applier(&self) -> &A {
        &self.applier
    }

    /// Latest revision of every release in `namespace`
    pub async fn list(&self, namespace: &str) -> Result<Vec<StoredRelease>> {
        self.storage.list(namespace).await
    }

    /// Latest revision of one release
    pub async fn status(&self, name: &str, namespace: &str) -> Result<StoredRelease> {
        self.storage.get_latest(namespace, name).await
    }

    /// Load `template_path`, set the image tag to `version`, apply `mutate`
    /// and install the result
    pub async fn install_with<T: ValuesSchema>(
        &self,
        template_path: &Path,
        name: &str,
        version: &str,
        namespace: &str,
        mutate: impl FnOnce(&mut T),
    ) -> Result<StoredRelease> {
        let renderer = ValuesRenderer::<T>::load(template_path)?;
        let rendered = renderer.render(|doc| {
            doc.image_mut().tag = version.to_string();
            mutate(doc);
        })?;

        self.install(renderer.chart(), rendered, &InstallOptions::new(name, namespace))
            .await
    }

    /// Install `document` as `options.name`, upgrading the release if it
    /// already exists
    pub async fn install<T: ValuesSchema>(
        &self,
        chart: &LoadedChart,
        document: RenderedValues<T>,
        options: &InstallOptions,
    ) -> Result<StoredRelease> {
        let previous = match self.storage.get_latest(&options.namespace, &options.name).await {
            Ok(release) => Some(release),
            Err(KubeError::ReleaseNotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        if let Some(previous) = &previous {
            check_not_busy(previous)?;
            if previous.archetype != T::ARCHETYPE {
                return Err(KubeError::ArchetypeMismatch {
                    name: previous.name.clone(),
                    expected: T::ARCHETYPE.to_string(),
                    actual: previous.archetype.to_string(),
                });
            }
        }

        let version = document.version().to_string();
        let release = match previous {
            None => {
                let info = ReleaseInfo::for_install(&options.name, &options.namespace);
                let spec = self.release_spec(chart, document, version, info)?;
                StoredRelease::for_install(options.name.clone(), options.namespace.clone(), spec)
            }
            Some(ref previous) => {
                let info =
                    ReleaseInfo::for_upgrade(&options.name, &options.namespace, previous.revision + 1);
                let spec = self.release_spec(chart, document, version, info)?;
                StoredRelease::for_upgrade(previous, spec)
            }
        };

        self.deploy(release, previous).await
    }

    /// Redeploy an existing release with a new image tag and otherwise
    /// unchanged values
    pub async fn update_version(&self, name: &str, namespace: &str, version: &str) -> Result<StoredRelease> {
        let previous = self.storage.get_latest(namespace, name).await?;
        check_not_busy(&previous)?;

        let chart = LoadedChart::load(&previous.chart.path)?;
        let info = ReleaseInfo::for_upgrade(name, namespace, previous.revision + 1);

        let spec = match previous.archetype {
            Archetype::Api => {
                let document = retag::<ApiValues>(&chart, &previous.values, version)?;
                self.release_spec(&chart, document, version.to_string(), info)?
            }
            Archetype::GameHost => {
                let document = retag::<GameHostValues>(&chart, &previous.values, version)?;
                self.release_spec(&chart, document, version.to_string(), info)?
            }
        };

        let release = StoredRelease::for_upgrade(&previous, spec);
        self.deploy(release, Some(previous)).await
    }

    /// Delete a release's resources and every stored revision
    pub async fn uninstall(&self, name: &str, namespace: &str) -> Result<StoredRelease> {
        let mut release = self.storage.get_latest(namespace, name).await?;
        check_not_busy(&release)?;

        release.mark_uninstalling();
        self.storage.update(&release).await?;

        let manifest = release.manifest();
        if let Err(e) = self.check_outcome(&release, self.applier.delete(namespace, &manifest).await) {
            release.mark_failed(e.to_string());
            self.storage.update(&release).await?;
            return Err(e);
        }

        self.storage.delete_all(namespace, name).await?;
        tracing::info!(release = %name, namespace = %namespace, "release uninstalled");

        Ok(release)
    }

    /// Write a release's manifests and values under `dir/<name>/`
    pub async fn output(&self, name: &str, namespace: &str, dir: &Path) -> Result<PathBuf> {
        let release = self.storage.get_latest(namespace, name).await?;
        let target = dir.join(&release.name);
        std::fs::create_dir_all(&target)?;

        for (file, body) in &release.manifests {
            let path = target.join(file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, body)?;
        }

        std::fs::write(target.join("values.yaml"), release.values.to_yaml()?)?;
        if let Some(notes) = &release.notes {
            std::fs::write(target.join("NOTES.txt"), notes)?;
        }

        tracing::debug!(release = %name, path = %target.display(), "wrote release output");
        Ok(target)
    }

    fn release_spec<T: ValuesSchema>(
        &self,
        chart: &LoadedChart,
        document: RenderedValues<T>,
        version: String,
        info: ReleaseInfo,
    ) -> Result<ReleaseSpec> {
        let values = document.into_values();
        let context = TemplateContext::new(values.clone(), info, &chart.metadata);
        let rendered = self.engine.render_chart(chart, &context)?;

        Ok(ReleaseSpec {
            version,
            archetype: T::ARCHETYPE,
            chart: ChartRef {
                metadata: chart.metadata.clone(),
                path: chart.root.clone(),
            },
            values,
            manifests: rendered.manifests,
            notes: rendered.notes,
        })
    }

    async fn deploy(&self, mut release: StoredRelease, previous: Option<StoredRelease>) -> Result<StoredRelease> {
        tracing::debug!(
            release = %release.name,
            revision = release.revision,
            "storing pending release"
        );
        self.storage.create(&release).await?;

        if let Some(mut previous) = previous {
            previous.mark_superseded();
            self.storage.update(&previous).await?;
        }

        let manifest = release.manifest();
        let outcome = self.applier.apply(&release.namespace, &manifest).await;
        if let Err(e) = self.check_outcome(&release, outcome) {
            release.mark_failed(e.to_string());
            self.storage.update(&release).await?;
            return Err(e);
        }

        release.mark_deployed();
        self.storage.update(&release).await?;
        tracing::info!(
            release = %release.name,
            namespace = %release.namespace,
            revision = release.revision,
            version = %release.version,
            "release deployed"
        );

        Ok(release)
    }

    /// Turn an applier outcome into an error when any resource failed
    fn check_outcome(
        &self,
        release: &StoredRelease,
        outcome: Result<OperationSummary>,
    ) -> Result<()> {
        let summary = outcome?;
        tracing::debug!(release = %release.name, summary = %summary.summary(), "cluster call finished");

        if summary.is_success() {
            Ok(())
        } else {
            Err(KubeError::ApplyFailed {
                name: release.name.clone(),
                message: summary.failure_message(),
            })
        }
    }
}

/// Refuse to touch a release another call is still working on
///
/// Stale pending records, left by a process that died mid-call, are taken over.
fn check_not_busy(release: &StoredRelease) -> Result<()> {
    if release.state.is_pending() && !release.state.is_stale() {
        return Err(KubeError::OperationInProgress {
            name: release.name.clone(),
            status: release.state.to_string(),
        });
    }
    Ok(())
}
