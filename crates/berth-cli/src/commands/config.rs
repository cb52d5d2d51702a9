//! Config command - manage the berth configuration file

use berth_core::BerthConfig;
use console::style;
use std::path::Path;

use super::Session;
use crate::error::{CliError, Result};

/// Write the default configuration
pub fn init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        return Err(CliError::config_with_help(
            format!("{} already exists", config_path.display()),
            "use --force to overwrite it",
        ));
    }

    BerthConfig::default().save_to(config_path)?;
    println!(
        "{} Wrote default configuration to {}",
        style("✓").green().bold(),
        config_path.display()
    );
    Ok(())
}

/// Print the active configuration
pub fn show(session: &Session) -> Result<()> {
    let yaml = serde_yaml::to_string(&session.config)
        .map_err(|e| CliError::internal(format!("failed to serialize configuration: {}", e)))?;

    println!("{} {}", style("#").dim(), style(session.config_path.display()).dim());
    print!("{}", yaml);
    Ok(())
}

/// Switch the current chart
pub fn use_chart(mut session: Session, chart: &str) -> Result<()> {
    session.config.use_chart(chart)?;
    session.config.save_to(&session.config_path)?;

    println!(
        "{} Current chart is now {}",
        style("✓").green().bold(),
        style(chart).cyan()
    );
    Ok(())
}
