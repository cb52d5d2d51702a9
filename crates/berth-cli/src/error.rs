//! CLI error types with exit code handling
//!
//! Library errors are sorted into the categories a user acts on: bad input,
//! missing prerequisites, configuration, image pipeline and cluster. Each
//! category has its own exit code.

use berth_core::CoreError;
use berth_engine::EngineError;
use berth_image::ImageError;
use berth_kube::{KubeError, SelectionError};
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Invalid arguments
    #[error("Invalid input: {message}")]
    #[diagnostic(code(berth::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Bad answer to the release selection prompt
    #[error("Selection failed: {0}")]
    #[diagnostic(
        code(berth::cli::selection),
        help("enter one of the numbers shown in the listing")
    )]
    Selection(#[from] SelectionError),

    /// Chart, values or config bundle missing or unusable
    #[error("Missing prerequisite: {message}")]
    #[diagnostic(code(berth::cli::prerequisite))]
    Prerequisite {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Berth configuration file unusable
    #[error("Configuration error: {message}")]
    #[diagnostic(code(berth::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Chart templates failed to render
    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(EngineError),

    /// Image build, registry login or push failed
    #[error("Image {step} failed: {source}")]
    #[diagnostic(code(berth::cli::image))]
    Image {
        step: &'static str,
        #[source]
        source: ImageError,
    },

    /// Release store or Kubernetes API failure
    #[error("Cluster error: {message}")]
    #[diagnostic(code(berth::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(berth::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(berth::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } | CliError::Selection(_) => exit_codes::VALIDATION_ERROR,
            CliError::Prerequisite { .. } => exit_codes::PREREQUISITE_ERROR,
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Engine(_) => exit_codes::TEMPLATE_ERROR,
            CliError::Image { .. } => exit_codes::IMAGE_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a validation error with help text
    pub fn validation_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a configuration error with help text
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    fn prerequisite(message: impl Into<String>, help: Option<&str>) -> Self {
        Self::Prerequisite {
            message: message.into(),
            help: help.map(str::to_string),
        }
    }

    fn cluster(message: impl Into<String>, help: Option<&str>) -> Self {
        Self::Cluster {
            message: message.into(),
            help: help.map(str::to_string),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::UnknownArchetype(_) => Self::Validation {
                message,
                help: Some("valid archetypes are `api` and `host`".to_string()),
            },
            CoreError::ConfigDirNotFound { .. } => {
                Self::prerequisite(message, Some("--config must point at an existing directory"))
            }
            CoreError::MissingArtifact { .. } | CoreError::DuplicateArtifact { .. } => {
                Self::prerequisite(
                    message,
                    Some("the config directory needs exactly one settings and one logging file"),
                )
            }
            CoreError::ChartNotFound { .. } | CoreError::InvalidChart { .. } => Self::prerequisite(
                message,
                Some("chart template paths are relative to the berth config file"),
            ),
            CoreError::SchemaMismatch { .. } => Self::prerequisite(
                message,
                Some("the chart's values.yaml must match the archetype it is configured for"),
            ),
            CoreError::UnknownChart { .. } => {
                Self::config_with_help(message, "run `berth config show` to see configured charts")
            }
            CoreError::InvalidConfig { .. } | CoreError::MissingField { .. } => Self::Config {
                message,
                help: None,
            },
            CoreError::Io(e) => Self::from(e),
            _ => Self::prerequisite(message, None),
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        let message = err.to_string();
        match err {
            KubeError::Chart(e) => Self::from(e),
            KubeError::Template(e) => Self::Engine(e),
            KubeError::Io(e) => Self::from(e),
            KubeError::ReleaseNotFound { .. } => {
                Self::cluster(message, Some("run `berth list` to see existing releases"))
            }
            KubeError::ArchetypeMismatch { .. } => Self::cluster(
                message,
                Some("use `berth update --re-install` to replace it with the other archetype"),
            ),
            KubeError::OperationInProgress { .. } => Self::cluster(
                message,
                Some("wait for the running operation to finish; stale records are taken over"),
            ),
            _ => Self::cluster(message, None),
        }
    }
}

impl From<ImageError> for CliError {
    fn from(err: ImageError) -> Self {
        Self::Image {
            step: err.step(),
            source: err,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
