//! Image hosts
//!
//! An [`ImageHost`] knows how to build a tagged image, obtain a registry
//! token and push. [`DockerHost`] shells out to `docker` and the `aws` CLI
//! (ECR login).

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{ImageError, Result};

/// Builds, authenticates against and pushes to a container registry
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Build `dockerfile` and tag the result as `tag`
    async fn build(&self, dockerfile: &Path, tag: &str) -> Result<()>;

    /// Obtain a registry token for `region`
    async fn login(&self, region: &str) -> Result<String>;

    /// Push `tag` using `token`
    async fn push(&self, tag: &str, token: &str) -> Result<()>;
}

/// Host backed by the docker and aws binaries
#[derive(Debug, Clone)]
pub struct DockerHost {
    docker: String,
    aws: String,
}

impl Default for DockerHost {
    fn default() -> Self {
        Self::with_binaries("docker", "aws")
    }
}

impl DockerHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use other binaries in place of `docker` and `aws`
    pub fn with_binaries(docker: impl Into<String>, aws: impl Into<String>) -> Self {
        Self {
            docker: docker.into(),
            aws: aws.into(),
        }
    }

    async fn run(&self, program: &str, args: &[&str], stdin: Option<&str>) -> Result<Output> {
        tracing::debug!(program, ?args, "running");
        let spawn_error = |source: std::io::Error| ImageError::Spawn {
            program: program.to_string(),
            source,
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(spawn_error)?;
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            // A child that exits without reading closes the pipe early; its
            // exit status reports the real outcome.
            if let Err(e) = pipe.write_all(input.as_bytes()).await
                && e.kind() != ErrorKind::BrokenPipe
            {
                return Err(spawn_error(e));
            }
        }

        child.wait_with_output().await.map_err(spawn_error)
    }
}

/// Registry host part of an image tag, if the tag names one
fn registry_of(tag: &str) -> Option<&str> {
    tag.split_once('/').map(|(registry, _)| registry)
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[async_trait]
impl ImageHost for DockerHost {
    async fn build(&self, dockerfile: &Path, tag: &str) -> Result<()> {
        let context = dockerfile
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let dockerfile = dockerfile.to_string_lossy();
        let context = context.to_string_lossy();

        let output = self
            .run(&self.docker, &["build", "-t", tag, "-f", &dockerfile, &context], None)
            .await?;
        if !output.status.success() {
            return Err(ImageError::Build {
                tag: tag.to_string(),
                stderr: stderr_of(&output),
            });
        }
        Ok(())
    }

    async fn login(&self, region: &str) -> Result<String> {
        let output = self
            .run(&self.aws, &["ecr", "get-login-password", "--region", region], None)
            .await?;
        if !output.status.success() {
            return Err(ImageError::Login {
                region: region.to_string(),
                stderr: stderr_of(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn push(&self, tag: &str, token: &str) -> Result<()> {
        let mut args = vec!["login", "--username", "AWS", "--password-stdin"];
        if let Some(registry) = registry_of(tag) {
            args.push(registry);
        }

        let login = self.run(&self.docker, &args, Some(token)).await?;
        if !login.status.success() {
            return Err(ImageError::Push {
                tag: tag.to_string(),
                stderr: stderr_of(&login),
            });
        }

        let output = self.run(&self.docker, &["push", tag], None).await?;
        if !output.status.success() {
            return Err(ImageError::Push {
                tag: tag.to_string(),
                stderr: stderr_of(&output),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_of() {
        assert_eq!(
            registry_of("000000000000.dkr.ecr.us-east-1.amazonaws.com/chart:1.0"),
            Some("000000000000.dkr.ecr.us-east-1.amazonaws.com")
        );
        assert_eq!(registry_of("chart:1.0"), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_login_returns_trimmed_stdout() {
        let host = DockerHost::with_binaries("true", "echo");
        let token = host.login("us-east-1").await.unwrap();
        assert_eq!(token, "ecr get-login-password --region us-east-1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_build_maps_to_build_error() {
        let host = DockerHost::with_binaries("false", "echo");
        let result = host.build(Path::new("Dockerfile"), "repo:1.0").await;
        assert!(matches!(result, Err(ImageError::Build { ref tag, .. }) if tag == "repo:1.0"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_push_succeeds_when_both_commands_do() {
        let host = DockerHost::with_binaries("true", "echo");
        host.push("registry.example.com/chart:1.0", "secret").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_binary_maps_to_spawn_error() {
        let host = DockerHost::with_binaries("berth-no-such-docker", "berth-no-such-aws");
        let result = host.login("us-east-1").await;
        assert!(matches!(result, Err(ImageError::Spawn { ref program, .. }) if program == "berth-no-such-aws"));
    }
}
