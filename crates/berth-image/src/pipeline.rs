//! The build / login / push sequence

use std::path::PathBuf;

use crate::error::Result;
use crate::host::ImageHost;

/// Image tag for `repository` at `version`
pub fn image_tag(repository: &str, version: &str) -> String {
    format!("{}:{}", repository, version)
}

/// What to build and where to push it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub dockerfile: PathBuf,
    pub repository: String,
    pub version: String,
    pub region: String,
}

impl BuildRequest {
    pub fn tag(&self) -> String {
        image_tag(&self.repository, &self.version)
    }
}

/// Runs the image steps ahead of a deployment
pub struct ImagePipeline;

impl ImagePipeline {
    /// Build, log in and push, in that order
    ///
    /// Without a request nothing runs and `None` comes back. The first failing
    /// step ends the sequence; earlier steps are not undone.
    pub async fn run<H: ImageHost + ?Sized>(
        host: &H,
        request: Option<&BuildRequest>,
    ) -> Result<Option<String>> {
        let Some(request) = request else {
            tracing::debug!("no build requested, skipping image pipeline");
            return Ok(None);
        };

        let tag = request.tag();

        tracing::info!(tag = %tag, dockerfile = %request.dockerfile.display(), "building image");
        host.build(&request.dockerfile, &tag).await?;

        tracing::debug!(region = %request.region, "logging in to registry");
        let token = host.login(&request.region).await?;

        tracing::info!(tag = %tag, "pushing image");
        host.push(&tag, &token).await?;

        Ok(Some(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImageError;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHost {
        calls: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingHost {
        fn failing_on(step: &'static str) -> Self {
            Self {
                calls: Mutex::default(),
                fail_on: Some(step),
            }
        }

        fn record(&self, call: String, step: &str) -> Result<()> {
            self.calls.lock().unwrap().push(call);
            match self.fail_on {
                Some("build") if step == "build" => Err(ImageError::Build {
                    tag: "t".to_string(),
                    stderr: "no space left".to_string(),
                }),
                Some("login") if step == "login" => Err(ImageError::Login {
                    region: "r".to_string(),
                    stderr: "expired".to_string(),
                }),
                Some("push") if step == "push" => Err(ImageError::Push {
                    tag: "t".to_string(),
                    stderr: "denied".to_string(),
                }),
                _ => Ok(()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageHost for RecordingHost {
        async fn build(&self, dockerfile: &Path, tag: &str) -> Result<()> {
            self.record(format!("build {} {}", dockerfile.display(), tag), "build")
        }

        async fn login(&self, region: &str) -> Result<String> {
            self.record(format!("login {}", region), "login")?;
            Ok("token".to_string())
        }

        async fn push(&self, tag: &str, token: &str) -> Result<()> {
            self.record(format!("push {} {}", tag, token), "push")
        }
    }

    fn request() -> BuildRequest {
        BuildRequest {
            dockerfile: PathBuf::from("/src/Dockerfile"),
            repository: "registry.example.com/chart".to_string(),
            version: "2.0".to_string(),
            region: "us-east-1".to_string(),
        }
    }

    #[test]
    fn test_image_tag() {
        assert_eq!(image_tag("repo", "1.2.3"), "repo:1.2.3");
        assert_eq!(request().tag(), "registry.example.com/chart:2.0");
    }

    #[tokio::test]
    async fn test_no_request_invokes_nothing() {
        let host = RecordingHost::default();
        let tag = ImagePipeline::run(&host, None).await.unwrap();

        assert_eq!(tag, None);
        assert!(host.calls().is_empty());
    }

    #[tokio::test]
    async fn test_steps_run_in_order() {
        let host = RecordingHost::default();
        let tag = ImagePipeline::run(&host, Some(&request())).await.unwrap();

        assert_eq!(tag.as_deref(), Some("registry.example.com/chart:2.0"));
        assert_eq!(
            host.calls(),
            vec![
                "build /src/Dockerfile registry.example.com/chart:2.0",
                "login us-east-1",
                "push registry.example.com/chart:2.0 token",
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_stops_remaining_steps() {
        let host = RecordingHost::failing_on("build");
        let result = ImagePipeline::run(&host, Some(&request())).await;
        assert!(matches!(result, Err(ImageError::Build { .. })));
        assert_eq!(host.calls().len(), 1);

        let host = RecordingHost::failing_on("login");
        let result = ImagePipeline::run(&host, Some(&request())).await;
        assert!(matches!(result, Err(ImageError::Login { .. })));
        assert_eq!(host.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_push_failure_is_reported() {
        let host = RecordingHost::failing_on("push");
        let result = ImagePipeline::run(&host, Some(&request())).await;

        assert!(matches!(result, Err(ImageError::Push { .. })));
        assert_eq!(host.calls().len(), 3);
        assert!(host.calls()[2].starts_with("push "));
    }
}
