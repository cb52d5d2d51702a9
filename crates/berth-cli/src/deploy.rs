//! Deployment flows behind `apply` and `update`
//!
//! A [`Deployer`] runs one flow against a chart descriptor: everything that
//! can fail locally (config bundle, chart template, values schema) is checked
//! first, then the image is built and pushed when asked, and only then is the
//! cluster touched.

use berth_core::{
    ApiValues, Archetype, BerthConfig, BundleSpec, ChartDescriptor, ConfigBundle, GameHostValues,
    ValuesSchema, generate_name,
};
use berth_image::{BuildRequest, ImageHost, ImagePipeline};
use berth_kube::{InstallOptions, ManifestApplier, ReleaseClient, StorageDriver, StoredRelease, ValuesRenderer};
use std::path::{Path, PathBuf};

use crate::error::{CliError, Result};

/// Name of the config volume every workload mounts
const CONFIG_VOLUME: &str = "config";

/// Inputs of a fresh install
#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub archetype: Archetype,
    pub version: String,
    pub name: Option<String>,
    pub config_dir: PathBuf,
    pub ingress_path: Option<String>,
    pub count: u32,
    /// Dockerfile, already resolved against the working directory
    pub dockerfile: Option<PathBuf>,
}

impl ApplyRequest {
    /// Explicit name, or the one generated from chart, archetype and version
    pub fn release_name(&self, chart: &ChartDescriptor) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| generate_name(&chart.name, self.archetype, &self.version))
    }

    fn ingress_path(&self) -> String {
        self.ingress_path
            .clone()
            .unwrap_or_else(|| format!("/{}", self.version))
    }
}

/// Inputs of an in-place version change
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub version: String,
    pub dockerfile: Option<PathBuf>,
    /// Replace the release with a fresh install of this archetype
    pub reinstall: Option<Archetype>,
    pub config_dir: Option<PathBuf>,
    pub ingress_path: Option<String>,
    pub count: u32,
}

impl UpdateRequest {
    fn as_apply(&self, archetype: Archetype) -> Result<ApplyRequest> {
        let config_dir = self.config_dir.clone().ok_or_else(|| {
            CliError::validation_with_help(
                "--re-install needs a config bundle",
                "pass --config <DIR> alongside --re-install",
            )
        })?;

        Ok(ApplyRequest {
            archetype,
            version: self.version.clone(),
            name: None,
            config_dir,
            ingress_path: self.ingress_path.clone(),
            count: self.count,
            dockerfile: self.dockerfile.clone(),
        })
    }
}

/// Runs deployment flows for one chart descriptor
pub struct Deployer<'a, S: StorageDriver, A: ManifestApplier, H: ImageHost + ?Sized> {
    client: &'a ReleaseClient<S, A>,
    host: &'a H,
    chart: &'a ChartDescriptor,
    bundle: &'a BundleSpec,
    config_path: &'a Path,
}

impl<'a, S: StorageDriver, A: ManifestApplier, H: ImageHost + ?Sized> Deployer<'a, S, A, H> {
    pub fn new(
        client: &'a ReleaseClient<S, A>,
        host: &'a H,
        config: &'a BerthConfig,
        chart: &'a ChartDescriptor,
        config_path: &'a Path,
    ) -> Self {
        Self {
            client,
            host,
            chart,
            bundle: &config.bundle,
            config_path,
        }
    }

    /// Install a release, upgrading it in place if the name is taken
    pub async fn apply(&self, request: &ApplyRequest) -> Result<StoredRelease> {
        self.apply_replacing(request, None).await
    }

    /// Move an existing release to a new image version
    ///
    /// With a re-install archetype the release is removed and a fresh one is
    /// installed under a generated name.
    pub async fn update(&self, name: &str, request: &UpdateRequest) -> Result<StoredRelease> {
        let current = self.client.status(name, &self.chart.namespace).await?;

        match request.reinstall {
            None => {
                self.build(&request.version, request.dockerfile.as_deref()).await?;
                Ok(self
                    .client
                    .update_version(&current.name, &current.namespace, &request.version)
                    .await?)
            }
            Some(archetype) => {
                let apply = request.as_apply(archetype)?;
                self.apply_replacing(&apply, Some(&current.name)).await
            }
        }
    }

    async fn apply_replacing(&self, request: &ApplyRequest, replaces: Option<&str>) -> Result<StoredRelease> {
        let name = request.release_name(self.chart);
        match request.archetype {
            Archetype::Api => {
                let path = request.ingress_path();
                self.install_as::<ApiValues>(&name, request, replaces, |doc| {
                    doc.count = request.count;
                    for host in &mut doc.ingress.hosts {
                        host.path = path.clone();
                    }
                })
                .await
            }
            Archetype::GameHost => {
                self.install_as::<GameHostValues>(&name, request, replaces, |_| {})
                    .await
            }
        }
    }

    async fn install_as<T: ValuesSchema>(
        &self,
        name: &str,
        request: &ApplyRequest,
        replaces: Option<&str>,
        customize: impl FnOnce(&mut T),
    ) -> Result<StoredRelease> {
        let bundle = ConfigBundle::load(&request.config_dir, self.bundle)?;
        let template = BerthConfig::resolve_path(self.config_path, self.chart.template_for(T::ARCHETYPE));
        let renderer = ValuesRenderer::<T>::load(&template)?;

        self.build(&request.version, request.dockerfile.as_deref()).await?;

        let rendered = renderer.render(|doc| {
            doc.image_mut().tag = request.version.clone();
            fill_identity(doc, self.chart, name, &bundle);
            customize(doc);
        })?;

        if let Some(old) = replaces {
            tracing::info!(release = %old, replacement = %name, "removing release before re-install");
            self.client.uninstall(old, &self.chart.namespace).await?;
        }

        let options = InstallOptions::new(name, &self.chart.namespace);
        Ok(self.client.install(renderer.chart(), rendered, &options).await?)
    }

    async fn build(&self, version: &str, dockerfile: Option<&Path>) -> Result<Option<String>> {
        let request = dockerfile.map(|dockerfile| BuildRequest {
            dockerfile: dockerfile.to_path_buf(),
            repository: self.chart.repository.clone(),
            version: version.to_string(),
            region: self.chart.region.clone(),
        });
        Ok(ImagePipeline::run(self.host, request.as_ref()).await?)
    }
}

/// Fields every archetype derives from the chart, the name and the bundle
fn fill_identity<T: ValuesSchema>(doc: &mut T, chart: &ChartDescriptor, name: &str, bundle: &ConfigBundle) {
    doc.image_mut().repository = chart.repository.clone();

    let body = doc.body_mut();
    body.name = name.to_string();
    body.namespace = chart.namespace.clone();

    let config = doc.config_mut();
    config.data.appsettings = bundle.settings.clone();
    config.data.log4net_config = bundle.logging.clone();
    config.config_map_name = format!("{}-config", name);
    config.config_name = CONFIG_VOLUME.to_string();

    for mount in doc.volume_mounts_mut() {
        mount.name = CONFIG_VOLUME.to_string();
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use async_trait::async_trait;
    use berth_image::ImageError;
    use berth_kube::{MockApplier, MockStorageDriver, ReleaseState};
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingHost {
        calls: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingHost {
        fn failing_on(step: &'static str) -> Self {
            Self {
                fail_on: Some(step),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String, step: &str) -> bool {
            self.calls.lock().unwrap().push(call);
            self.fail_on == Some(step)
        }
    }

    #[async_trait]
    impl ImageHost for RecordingHost {
        async fn build(&self, dockerfile: &Path, tag: &str) -> berth_image::Result<()> {
            if self.record(format!("build {} {}", dockerfile.display(), tag), "build") {
                return Err(ImageError::Build {
                    tag: tag.to_string(),
                    stderr: "boom".to_string(),
                });
            }
            Ok(())
        }

        async fn login(&self, region: &str) -> berth_image::Result<String> {
            if self.record(format!("login {}", region), "login") {
                return Err(ImageError::Login {
                    region: region.to_string(),
                    stderr: "expired".to_string(),
                });
            }
            Ok("token".to_string())
        }

        async fn push(&self, tag: &str, _token: &str) -> berth_image::Result<()> {
            if self.record(format!("push {}", tag), "push") {
                return Err(ImageError::Push {
                    tag: tag.to_string(),
                    stderr: "denied".to_string(),
                });
            }
            Ok(())
        }
    }

    struct Fixture {
        tmp: TempDir,
        config: BerthConfig,
        client: ReleaseClient<MockStorageDriver, MockApplier>,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_applier(MockApplier::new())
        }

        fn with_applier(applier: MockApplier) -> Self {
            let tmp = TempDir::new().unwrap();
            write_chart(&tmp.path().join("charts/api"), "api", API_VALUES);
            write_chart(&tmp.path().join("charts/host"), "host", HOST_VALUES);
            write_bundle(&tmp.path().join("cfg"));

            Self {
                tmp,
                config: BerthConfig::default(),
                client: ReleaseClient::new(MockStorageDriver::new(), applier),
            }
        }

        fn config_path(&self) -> PathBuf {
            self.tmp.path().join("config.yaml")
        }

        fn apply(&self, archetype: Archetype, version: &str) -> ApplyRequest {
            ApplyRequest {
                archetype,
                version: version.to_string(),
                name: None,
                config_dir: self.tmp.path().join("cfg"),
                ingress_path: None,
                count: 1,
                dockerfile: None,
            }
        }

        fn update(&self, version: &str) -> UpdateRequest {
            UpdateRequest {
                version: version.to_string(),
                dockerfile: None,
                reinstall: None,
                config_dir: None,
                ingress_path: None,
                count: 1,
            }
        }
    }

    macro_rules! deployer {
        ($fx:expr, $host:expr, $path:expr) => {
            Deployer::new(
                &$fx.client,
                $host,
                &$fx.config,
                $fx.config.current_chart().unwrap(),
                $path,
            )
        };
    }

    #[tokio::test]
    async fn test_apply_api_end_to_end() {
        let fx = Fixture::new();
        let host = RecordingHost::default();
        let path = fx.config_path();
        let deployer = deployer!(fx, &host, &path);

        let release = deployer.apply(&fx.apply(Archetype::Api, "2.0")).await.unwrap();

        assert_eq!(release.name, "blockraiders-api20");
        assert_eq!(release.state, ReleaseState::Deployed);
        assert_eq!(release.version, "2.0");

        let values = release.values.inner();
        assert_eq!(
            values["image"]["repository"],
            "000000000000.dkr.ecr.us-east-1.amazonaws.com/blockraiders"
        );
        assert_eq!(values["image"]["tag"], "2.0");
        assert_eq!(values["body"]["name"], "blockraiders-api20");
        assert_eq!(values["body"]["namespace"], "default");
        assert_eq!(values["ingress"]["hosts"][0]["path"], "/2.0");
        assert_eq!(values["config"]["configMapName"], "blockraiders-api20-config");
        assert_eq!(values["config"]["configName"], "config");
        assert_eq!(values["config"]["data"]["appsettings"], r#"{"Port": 8080}"#);
        assert_eq!(values["config"]["data"]["log4netConfig"], "<log4net/>");
        assert_eq!(values["volumeMounts"][0]["name"], "config");

        assert!(host.calls().is_empty());
        assert_eq!(fx.client.applier().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_host_uses_host_template() {
        let fx = Fixture::new();
        let host = RecordingHost::default();
        let path = fx.config_path();
        let deployer = deployer!(fx, &host, &path);

        let mut request = fx.apply(Archetype::GameHost, "1.5");
        request.name = Some("arena".to_string());
        let release = deployer.apply(&request).await.unwrap();

        assert_eq!(release.name, "arena");
        assert_eq!(release.archetype, Archetype::GameHost);
        assert_eq!(release.chart.metadata.name, "host");
        assert!(release.values.inner().get("ingress").is_none());
    }

    #[tokio::test]
    async fn test_apply_explicit_path_and_count() {
        let fx = Fixture::new();
        let host = RecordingHost::default();
        let path = fx.config_path();
        let deployer = deployer!(fx, &host, &path);

        let mut request = fx.apply(Archetype::Api, "2.0");
        request.ingress_path = Some("/game".to_string());
        request.count = 3;
        let release = deployer.apply(&request).await.unwrap();

        assert_eq!(release.values.inner()["ingress"]["hosts"][0]["path"], "/game");
        assert_eq!(release.values.inner()["count"], 3);
    }

    #[tokio::test]
    async fn test_build_runs_before_install() {
        let fx = Fixture::new();
        let host = RecordingHost::default();
        let path = fx.config_path();
        let deployer = deployer!(fx, &host, &path);

        let mut request = fx.apply(Archetype::Api, "2.0");
        request.dockerfile = Some(PathBuf::from("/src/Dockerfile"));
        deployer.apply(&request).await.unwrap();

        let tag = "000000000000.dkr.ecr.us-east-1.amazonaws.com/blockraiders:2.0";
        assert_eq!(
            host.calls(),
            vec![
                format!("build /src/Dockerfile {}", tag),
                "login us-east-1".to_string(),
                format!("push {}", tag),
            ]
        );
    }

    #[tokio::test]
    async fn test_build_failure_prevents_install() {
        let fx = Fixture::new();
        let host = RecordingHost::failing_on("build");
        let path = fx.config_path();
        let deployer = deployer!(fx, &host, &path);

        let mut request = fx.apply(Archetype::Api, "2.0");
        request.dockerfile = Some(PathBuf::from("Dockerfile"));
        let result = deployer.apply(&request).await;

        assert!(matches!(result, Err(CliError::Image { step: "build", .. })));
        assert!(fx.client.applier().calls().is_empty());
        assert!(fx.client.list("default").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_or_push_failure_prevents_install() {
        for (step, calls) in [("login", 2), ("push", 3)] {
            let fx = Fixture::new();
            let host = RecordingHost::failing_on(step);
            let path = fx.config_path();
            let deployer = deployer!(fx, &host, &path);

            let mut request = fx.apply(Archetype::Api, "2.0");
            request.dockerfile = Some(PathBuf::from("Dockerfile"));
            let result = deployer.apply(&request).await;

            assert!(
                matches!(&result, Err(CliError::Image { step: s, .. }) if *s == step),
                "{}: {:?}",
                step,
                result
            );
            assert_eq!(host.calls().len(), calls);
            assert!(fx.client.applier().calls().is_empty());
            assert!(fx.client.list("default").await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_missing_bundle_stops_before_build() {
        let fx = Fixture::new();
        let host = RecordingHost::default();
        let path = fx.config_path();
        let deployer = deployer!(fx, &host, &path);

        let mut request = fx.apply(Archetype::Api, "2.0");
        request.config_dir = fx.tmp.path().join("missing");
        request.dockerfile = Some(PathBuf::from("Dockerfile"));
        let result = deployer.apply(&request).await;

        assert!(matches!(result, Err(CliError::Prerequisite { .. })));
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_keeps_values() {
        let fx = Fixture::new();
        let host = RecordingHost::default();
        let path = fx.config_path();
        let deployer = deployer!(fx, &host, &path);

        let mut request = fx.apply(Archetype::Api, "1.0");
        request.count = 4;
        deployer.apply(&request).await.unwrap();

        let updated = deployer
            .update("blockraiders-api10", &fx.update("1.1"))
            .await
            .unwrap();

        assert_eq!(updated.revision, 2);
        assert_eq!(updated.version, "1.1");
        assert_eq!(updated.values.inner()["count"], 4);
        assert_eq!(updated.values.inner()["ingress"]["hosts"][0]["path"], "/1.0");
    }

    #[tokio::test]
    async fn test_update_missing_release_skips_build() {
        let fx = Fixture::new();
        let host = RecordingHost::default();
        let path = fx.config_path();
        let deployer = deployer!(fx, &host, &path);

        let mut request = fx.update("1.1");
        request.dockerfile = Some(PathBuf::from("Dockerfile"));
        let result = deployer.update("nope", &request).await;

        assert!(matches!(result, Err(CliError::Cluster { .. })));
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reinstall_replaces_release() {
        let fx = Fixture::new();
        let host = RecordingHost::default();
        let path = fx.config_path();
        let deployer = deployer!(fx, &host, &path);

        deployer.apply(&fx.apply(Archetype::Api, "1.0")).await.unwrap();

        let mut request = fx.update("2.0");
        request.reinstall = Some(Archetype::GameHost);
        request.config_dir = Some(fx.tmp.path().join("cfg"));
        let release = deployer.update("blockraiders-api10", &request).await.unwrap();

        assert_eq!(release.name, "blockraiders-host20");
        assert_eq!(release.revision, 1);

        let names: Vec<String> = fx
            .client
            .list("default")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["blockraiders-host20"]);
    }

    #[tokio::test]
    async fn test_reinstall_requires_config() {
        let fx = Fixture::new();
        let host = RecordingHost::default();
        let path = fx.config_path();
        let deployer = deployer!(fx, &host, &path);

        deployer.apply(&fx.apply(Archetype::Api, "1.0")).await.unwrap();

        let mut request = fx.update("2.0");
        request.reinstall = Some(Archetype::Api);
        let result = deployer.update("blockraiders-api10", &request).await;

        assert!(matches!(result, Err(CliError::Validation { .. })));
        assert_eq!(fx.client.list("default").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_apply_surfaces_cluster_error() {
        let fx = Fixture::with_applier(MockApplier::failing("quota exceeded"));
        let host = RecordingHost::default();
        let path = fx.config_path();
        let deployer = deployer!(fx, &host, &path);

        let result = deployer.apply(&fx.apply(Archetype::Api, "1.0")).await;
        assert!(matches!(result, Err(CliError::Cluster { .. })));

        let stored = fx.client.status("blockraiders-api10", "default").await.unwrap();
        assert_eq!(stored.state.status_name(), "failed");
    }
}
