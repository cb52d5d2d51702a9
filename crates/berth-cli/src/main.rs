//! Berth CLI - build, deploy and manage chart-templated services

use berth_core::Archetype;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod deploy;
mod error;
mod exit_codes;
mod prompt;

use commands::Session;
use deploy::{ApplyRequest, UpdateRequest};
use error::{CliError, Result};

#[derive(Parser)]
#[command(name = "berth")]
#[command(version)]
#[command(about = "Build, deploy and manage chart-templated services on Kubernetes", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ~/.config/berth/config.yaml)
    #[arg(long, global = true, env = "BERTH_CONFIG")]
    config_file: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a release's manifests and values to a directory
    Output {
        /// Directory to write into
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Release name (prompts when omitted)
        #[arg(long)]
        name: Option<String>,
    },

    /// Install a new release of the current chart
    Apply {
        /// Service archetype: api or host
        #[arg(value_parser = parse_archetype)]
        archetype: Archetype,

        /// Image version to deploy
        #[arg(id = "image_version", value_name = "VERSION")]
        version: String,

        /// Release name (default: <chart>-<archetype><version without dots>)
        #[arg(long)]
        name: Option<String>,

        /// Directory holding the settings and logging files
        #[arg(long = "config")]
        config: PathBuf,

        /// Ingress path (default: /<version>)
        #[arg(long)]
        path: Option<String>,

        /// Replica count (api only)
        #[arg(long, default_value_t = 1)]
        count: u32,

        /// Build and push the image from this Dockerfile first
        #[arg(long)]
        build: Option<PathBuf>,
    },

    /// Move an existing release to a new image version
    Update {
        /// Image version to deploy
        #[arg(id = "image_version", value_name = "VERSION")]
        version: String,

        /// Release name (prompts when omitted)
        #[arg(long)]
        name: Option<String>,

        /// Build and push the image from this Dockerfile first
        #[arg(long)]
        build: Option<PathBuf>,

        /// Delete the release and install a fresh one of this archetype
        #[arg(long = "re-install", value_parser = parse_archetype, requires = "config")]
        re_install: Option<Archetype>,

        /// Directory holding the settings and logging files (with --re-install)
        #[arg(long = "config")]
        config: Option<PathBuf>,

        /// Ingress path for --re-install (default: /<version>)
        #[arg(long)]
        path: Option<String>,

        /// Replica count for --re-install
        #[arg(long, default_value_t = 1)]
        count: u32,
    },

    /// Delete a release and its history
    Delete {
        /// Release name (prompts when omitted)
        #[arg(long)]
        name: Option<String>,
    },

    /// List releases of the current chart
    List,

    /// Manage the berth configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the active configuration
    Show,

    /// Switch the current chart
    Use {
        /// Chart name from the configuration
        chart: String,
    },
}

fn parse_archetype(value: &str) -> std::result::Result<Archetype, String> {
    value.parse().map_err(|e: berth_core::CoreError| e.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config_file = cli.config_file.as_deref();

    match cli.command {
        Commands::Output { path, name } => {
            let session = Session::load(config_file)?;
            commands::output::run(&session, &path, name).await
        }

        Commands::Apply {
            archetype,
            version,
            name,
            config,
            path,
            count,
            build,
        } => {
            let session = Session::load(config_file)?;
            let request = ApplyRequest {
                archetype,
                version,
                name,
                config_dir: config,
                ingress_path: path,
                count,
                dockerfile: resolve_dockerfile(build)?,
            };
            commands::apply::run(&session, request).await
        }

        Commands::Update {
            version,
            name,
            build,
            re_install,
            config,
            path,
            count,
        } => {
            let session = Session::load(config_file)?;
            let request = UpdateRequest {
                version,
                dockerfile: resolve_dockerfile(build)?,
                reinstall: re_install,
                config_dir: config,
                ingress_path: path,
                count,
            };
            commands::update::run(&session, name, request).await
        }

        Commands::Delete { name } => {
            let session = Session::load(config_file)?;
            commands::delete::run(&session, name).await
        }

        Commands::List => {
            let session = Session::load(config_file)?;
            commands::list::run(&session).await
        }

        Commands::Config { command } => match command {
            ConfigCommands::Init { force } => {
                let path = commands::config_path(config_file)?;
                commands::config::init(&path, force)
            }
            ConfigCommands::Show => commands::config::show(&Session::load(config_file)?),
            ConfigCommands::Use { chart } => {
                commands::config::use_chart(Session::load(config_file)?, &chart)
            }
        },
    }
}

/// Dockerfiles are given relative to the working directory
fn resolve_dockerfile(build: Option<PathBuf>) -> Result<Option<PathBuf>> {
    match build {
        Some(path) if path.is_relative() => {
            let cwd = std::env::current_dir().map_err(|e| {
                CliError::internal(format!("cannot determine working directory: {}", e))
            })?;
            Ok(Some(cwd.join(path)))
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_positional_alongside_version_flag() {
        let cli = Cli::try_parse_from(["berth", "apply", "api", "2.0", "--config", "cfg"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Apply { version, archetype: Archetype::Api, .. } if version == "2.0"
        ));

        let cli = Cli::try_parse_from(["berth", "update", "1.1", "--name", "demo-api10"]).unwrap();
        assert!(matches!(cli.command, Commands::Update { version, .. } if version == "1.1"));

        let err = Cli::try_parse_from(["berth", "apply", "--version"]).map(|_| ()).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
